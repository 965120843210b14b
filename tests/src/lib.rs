//! End-to-end replay scenarios against `mock-service`. Everything lives under `tests/`.
