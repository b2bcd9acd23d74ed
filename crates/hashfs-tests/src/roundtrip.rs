//! Round-trip properties of the persisted index encodings.
