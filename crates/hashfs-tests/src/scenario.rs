//! End-to-end namespace scenarios over the reference store.
