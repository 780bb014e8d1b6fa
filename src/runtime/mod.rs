//! 视图运行时：事件总线、声明式路由、手势识别与区块导航

pub mod bus;
pub mod gesture;
pub mod navigator;
pub mod router;

pub use bus::{EventBus, ListenerId, ListenerOptions};
pub use gesture::{classify, PullRecognizer, PullThresholds};
pub use navigator::{SectionNavigator, Transition};
pub use router::{attach_routes, Handler, Route, RouteSet, RoutedEvent};
