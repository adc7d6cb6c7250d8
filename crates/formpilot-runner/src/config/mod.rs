pub mod params;
pub mod schema;

pub use params::{ParamDef, Params};
pub use schema::{
    BrowserConfig, Condition, Config, OnFailure, RetryConfig, SuccessCondition, TargetUrl,
    Timing, Viewport,
};
