pub mod inspect;
pub mod project;
pub mod run;
pub mod runs;
pub mod setup;
pub mod toolchains;
pub mod util;

pub use inspect::*;
pub use project::*;
pub use run::*;
pub use runs::*;
pub use setup::*;
pub use toolchains::*;
pub use util::*;
