pub mod gate;
pub mod fanout;
pub mod best_match;
pub mod render;

pub use gate::{gate, GateRelease, GateWaiter};
pub use fanout::fan_out;
pub use best_match::best_match_pass;
pub use render::build_reply;
