use std::sync::Once;

pub mod s1_parser;
pub mod s2_analyzer;
pub mod s3_graphics;
pub mod s4_generator;

static INIT: Once = Once::new();

pub fn init_logger() {
    INIT.call_once(|| {
        env_logger::init();
    });
}
