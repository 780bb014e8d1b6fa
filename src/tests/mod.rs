//! 单元测试模块
//! 覆盖事件总线、路由、下拉手势、区块导航与行程视图

pub mod bus_tests;
pub mod router_tests;
