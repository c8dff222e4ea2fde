pub mod permissions;
pub mod throttle;

pub use permissions::Permission;
pub use throttle::{ThrottleClass, ThrottleScope, Throttles};

use throttle::ThrottleClass::{Anon, Scoped, User};

/// Permission and throttles attached to a route group
#[derive(Debug, Clone, Copy)]
pub struct EndpointPolicy {
    pub name: &'static str,
    pub permission: Permission,
    pub throttles: &'static [ThrottleClass],
}

pub const TITLES: EndpointPolicy = EndpointPolicy {
    name: "titles",
    permission: Permission::AdminOrReadOnly,
    throttles: &[Anon],
};

pub const PLATFORMS: EndpointPolicy = EndpointPolicy {
    name: "platforms",
    permission: Permission::AdminOrReadOnly,
    throttles: &[Anon],
};

pub const REVIEW_CREATE: EndpointPolicy = EndpointPolicy {
    name: "review-create",
    permission: Permission::Authenticated,
    throttles: &[Scoped(ThrottleScope::ReviewCreate)],
};

pub const REVIEW_LIST: EndpointPolicy = EndpointPolicy {
    name: "review-list",
    permission: Permission::AllowAny,
    throttles: &[Scoped(ThrottleScope::ReviewList), Anon],
};

/// Ownership is checked per object inside the handler
pub const REVIEW_DETAIL: EndpointPolicy = EndpointPolicy {
    name: "review-detail",
    permission: Permission::AllowAny,
    throttles: &[Scoped(ThrottleScope::ReviewDetail), Anon],
};

pub const USER_REVIEWS: EndpointPolicy = EndpointPolicy {
    name: "user-reviews",
    permission: Permission::AllowAny,
    throttles: &[Anon, User],
};
