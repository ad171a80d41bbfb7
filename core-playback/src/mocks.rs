//! Mock decoder shared by unit tests.

use bridge_traits::decoder::{Decoder, DecoderId};
use bridge_traits::error::Result;
use mockall::mock;

mock! {
    pub Dec {}

    impl Decoder for Dec {
        fn prepare(&mut self) -> Result<()>;
        fn start(&mut self) -> Result<()>;
        fn pause(&mut self) -> Result<()>;
        fn seek_to(&mut self, position_ms: u64) -> Result<()>;
        fn set_volume(&mut self, volume: f32) -> Result<()>;
        fn current_position_ms(&self) -> Result<u64>;
        fn duration_ms(&self) -> Option<u64>;
        fn is_playing(&self) -> bool;
        fn chain_next(&mut self, next: Option<DecoderId>) -> Result<bool>;
        fn dispose(&mut self);
    }
}
