//! Protocol value types.

mod grant;
mod ids;
mod response;
mod scope;

pub use grant::{GrantType, TokenClass};
pub use ids::{ClientInfo, LoginMethod, SessionId, UserId};
pub use response::{ResponseFlow, ResponseMode, ResponseType, ResponseTypeSet};
pub use scope::{Prompt, PromptSet, ScopeSet, scopes};
