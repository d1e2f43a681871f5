use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::photo::{PhotoStatus, PhotoSubmission};

/// Aggregate counts over all stored submissions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct PhotoStats {
    pub total: u64,
    pub pending: u64,
    pub approved: u64,
    pub rejected: u64,
    pub deletion_requested: u64,
    pub deleted: u64,
    /// Number of distinct shops with at least one stored submission.
    pub shops: u64,
}

impl PhotoStats {
    /// Tally a set of submissions.
    pub fn from_photos<'a>(photos: impl IntoIterator<Item = &'a PhotoSubmission>) -> Self {
        let mut stats = Self::default();
        let mut shops = HashSet::new();
        for photo in photos {
            stats.total += 1;
            match photo.status {
                PhotoStatus::Pending => stats.pending += 1,
                PhotoStatus::Approved => stats.approved += 1,
                PhotoStatus::Rejected => stats.rejected += 1,
                PhotoStatus::DeletionRequested => stats.deletion_requested += 1,
                PhotoStatus::Deleted => stats.deleted += 1,
            }
            shops.insert(photo.shop_id.as_str());
        }
        stats.shops = shops.len() as u64;
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::photo::tests::sample_photo;
    use crate::types::ShopId;

    #[test]
    fn tallies_statuses_and_shops() {
        let mut other = sample_photo(PhotoStatus::Deleted);
        other.shop_id = ShopId::from("valley-dairy");
        let photos = vec![
            sample_photo(PhotoStatus::Pending),
            sample_photo(PhotoStatus::Approved),
            sample_photo(PhotoStatus::Approved),
            other,
        ];
        let stats = PhotoStats::from_photos(&photos);
        assert_eq!(stats.total, 4);
        assert_eq!(stats.pending, 1);
        assert_eq!(stats.approved, 2);
        assert_eq!(stats.deleted, 1);
        assert_eq!(stats.rejected, 0);
        assert_eq!(stats.shops, 2);
    }

    #[test]
    fn empty() {
        let stats = PhotoStats::from_photos(std::iter::empty());
        assert_eq!(stats, PhotoStats::default());
    }
}
