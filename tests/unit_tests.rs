//! Entry point for the tests under `tests/unit/`.

mod unit;
