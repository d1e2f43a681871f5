mod cleanup;
