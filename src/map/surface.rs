use crate::map::{Bounds, MarkerStyle, ShapeStyle};
use crate::model::LatLng;

/// 地图渲染方的边界接口
///
/// 控制器只通过这组调用操作底层图元：按田块 id 增删多边形与标记、
/// 原地改样式、绑定/打开气泡、平移与缩放视野。除控制器外
/// 任何代码都不允许直接碰图元。
pub trait MapSurface: Send {
    fn add_polygon(&mut self, id: &str, points: &[LatLng], style: ShapeStyle);
    fn add_marker(&mut self, id: &str, at: LatLng, style: MarkerStyle);
    fn set_polygon_style(&mut self, id: &str, style: ShapeStyle);
    fn set_marker_style(&mut self, id: &str, style: MarkerStyle);
    fn bind_popup(&mut self, id: &str, content: String);
    fn open_popup(&mut self, id: &str);
    fn close_popup(&mut self);
    fn remove_group(&mut self, id: &str);
    fn pan_to(&mut self, center: LatLng);
    fn fit_bounds(&mut self, bounds: Bounds);
    fn clear(&mut self);
}
