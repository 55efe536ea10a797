//! Unit test modules.

mod codec_test;
mod request_test;
