//! Pre-configured filter stacks.
//!
//! Each function returns a [`ServiceBuilder`] with an activity filter
//! already stacked; finish it with [`ServiceBuilderExt::bot`]. Activities
//! that do not match are rejected with
//! [`ActivitySkipped`](crate::error::ActivitySkipped).
//!
//! ```rust,ignore
//! let service = on_message().bot(adapter, echo_bot);
//! ```

use tower::ServiceBuilder;
use tower::filter::FilterLayer;
use tower_layer::{Identity, Stack};

use parley_core::{Activity, activity_types};

use crate::service::{ActivityPredicate, ServiceBuilderExt};

/// The `ServiceBuilder` returned by the functions in this module.
pub type FilterServiceBuilder = ServiceBuilder<Stack<FilterLayer<ActivityPredicate>, Identity>>;

/// Passes activities of the given type.
pub fn on_activity_type(activity_type: &'static str) -> FilterServiceBuilder {
    ServiceBuilder::new().rule(move |activity: &Activity| activity.is_type(activity_type))
}

/// Passes **message** activities.
pub fn on_message() -> FilterServiceBuilder {
    on_activity_type(activity_types::MESSAGE)
}

/// Passes **event** activities with the given name.
pub fn on_event(name: &'static str) -> FilterServiceBuilder {
    ServiceBuilder::new().rule(move |activity: &Activity| {
        activity.is_type(activity_types::EVENT) && activity.name.as_deref() == Some(name)
    })
}
