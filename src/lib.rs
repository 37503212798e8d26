pub mod config;
pub mod driver;
pub mod error;
pub mod identity;
pub mod logging;
pub mod scenario;
pub mod session;

pub use config::SmokeConfig;
pub use driver::{PageDriver, WaitConfig};
pub use error::{Result, SmokeError};
pub use identity::TestUser;
pub use scenario::{AuthScenario, RunReport, Stage};
pub use session::BrowserSession;
