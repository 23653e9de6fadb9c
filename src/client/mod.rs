//! Client side: session, authenticated requests, access rules and menu

pub mod access;
pub mod app;
pub mod menu;
pub mod requester;
pub mod session;
pub mod storage;
pub mod transport;

pub use access::{AccessEvaluator, AccessRule, AllowAll, AllowPolicy, AllowRequest};
pub use app::{ClientApp, Startup, UserLabel};
pub use menu::{LOGOUT_FORM, MenuItem, filter_menu, first_allowed};
pub use requester::AuthenticatedRequester;
pub use session::{
    AuthPayload, RenewalRequest, RoleMetadata, SessionPhase, SessionSnapshot, SessionStore,
    UserIdentity,
};
pub use storage::{DurableStorage, FileStorage, MemoryStorage, StorageError};
#[cfg(feature = "http-client")]
pub use transport::HttpTransport;
pub use transport::{LocalTransport, Reply, RequestParams, Transport};
