pub mod account;
pub mod delivery;
pub mod events;
pub mod markout;
pub mod swap;
pub mod validation;

pub use account::*;
pub use delivery::*;
pub use events::*;
pub use markout::*;
pub use swap::*;
pub use validation::*;
