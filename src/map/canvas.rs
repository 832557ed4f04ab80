use crate::map::{Bounds, MapSurface, MarkerStyle, ShapeStyle};
use crate::model::LatLng;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// 终端画布上的一个多边形
#[derive(Debug, Clone)]
pub struct DrawnPolygon {
    pub points: Vec<LatLng>,
    pub style: ShapeStyle,
}

/// 终端画布上的一个标记点
#[derive(Debug, Clone)]
pub struct DrawnMarker {
    pub at: LatLng,
    pub style: MarkerStyle,
}

/// 画布的可绘制状态。Surface 侧写入，UI 每帧读取。
#[derive(Debug, Clone)]
pub struct CanvasState {
    pub polygons: HashMap<String, DrawnPolygon>,
    pub markers: HashMap<String, DrawnMarker>,
    pub popups: HashMap<String, String>,
    pub open_popup: Option<String>,
    pub viewport: Bounds,
}

impl CanvasState {
    fn new() -> Self {
        Self {
            polygons: HashMap::new(),
            markers: HashMap::new(),
            popups: HashMap::new(),
            open_popup: None,
            // 默认视野：突尼斯中北部
            viewport: Bounds {
                south: 34.5,
                west: 9.8,
                north: 36.2,
                east: 11.2,
            },
        }
    }
}

/// ratatui 画布版的地图渲染方。
/// 控制器通过 `MapSurface` 写入，`ui::draw` 持有共享句柄读出来画。
pub struct CanvasSurface {
    state: Arc<Mutex<CanvasState>>,
}

impl CanvasSurface {
    pub fn new() -> (Self, Arc<Mutex<CanvasState>>) {
        let state = Arc::new(Mutex::new(CanvasState::new()));
        (
            Self {
                state: state.clone(),
            },
            state,
        )
    }

    fn with<R>(&mut self, f: impl FnOnce(&mut CanvasState) -> R) -> R {
        let mut guard = self.state.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut guard)
    }
}

impl MapSurface for CanvasSurface {
    fn add_polygon(&mut self, id: &str, points: &[LatLng], style: ShapeStyle) {
        let poly = DrawnPolygon {
            points: points.to_vec(),
            style,
        };
        self.with(|s| s.polygons.insert(id.to_string(), poly));
    }

    fn add_marker(&mut self, id: &str, at: LatLng, style: MarkerStyle) {
        self.with(|s| s.markers.insert(id.to_string(), DrawnMarker { at, style }));
    }

    fn set_polygon_style(&mut self, id: &str, style: ShapeStyle) {
        self.with(|s| {
            if let Some(poly) = s.polygons.get_mut(id) {
                poly.style = style;
            }
        });
    }

    fn set_marker_style(&mut self, id: &str, style: MarkerStyle) {
        self.with(|s| {
            if let Some(marker) = s.markers.get_mut(id) {
                marker.style = style;
            }
        });
    }

    fn bind_popup(&mut self, id: &str, content: String) {
        self.with(|s| s.popups.insert(id.to_string(), content));
    }

    fn open_popup(&mut self, id: &str) {
        self.with(|s| s.open_popup = Some(id.to_string()));
    }

    fn close_popup(&mut self) {
        self.with(|s| s.open_popup = None);
    }

    fn remove_group(&mut self, id: &str) {
        self.with(|s| {
            s.polygons.remove(id);
            s.markers.remove(id);
            s.popups.remove(id);
            if s.open_popup.as_deref() == Some(id) {
                s.open_popup = None;
            }
        });
    }

    fn pan_to(&mut self, center: LatLng) {
        self.with(|s| {
            let half_lat = (s.viewport.north - s.viewport.south) / 2.0;
            let half_lng = (s.viewport.east - s.viewport.west) / 2.0;
            s.viewport = Bounds {
                south: center.lat - half_lat,
                north: center.lat + half_lat,
                west: center.lng - half_lng,
                east: center.lng + half_lng,
            };
        });
    }

    fn fit_bounds(&mut self, bounds: Bounds) {
        self.with(|s| s.viewport = bounds);
    }

    fn clear(&mut self) {
        self.with(|s| {
            s.polygons.clear();
            s.markers.clear();
            s.popups.clear();
            s.open_popup = None;
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::HealthStatus;

    #[test]
    fn remove_group_drops_all_primitives() {
        let (mut surface, state) = CanvasSurface::new();
        let style = ShapeStyle::for_field(HealthStatus::Healthy, false, false);
        let marker = MarkerStyle::for_field(HealthStatus::Healthy, false, false);
        surface.add_polygon("a", &[LatLng::new(0.0, 0.0)], style);
        surface.add_marker("a", LatLng::new(0.0, 0.0), marker);
        surface.bind_popup("a", "内容".to_string());
        surface.open_popup("a");

        surface.remove_group("a");
        let s = state.lock().unwrap();
        assert!(s.polygons.is_empty());
        assert!(s.markers.is_empty());
        assert!(s.popups.is_empty());
        assert_eq!(s.open_popup, None);
    }

    #[test]
    fn pan_preserves_viewport_span() {
        let (mut surface, state) = CanvasSurface::new();
        let before = state.lock().unwrap().viewport;
        surface.pan_to(LatLng::new(35.0, 10.5));
        let after = state.lock().unwrap().viewport;
        assert!((after.north - after.south - (before.north - before.south)).abs() < 1e-9);
        assert!((after.center().lat - 35.0).abs() < 1e-9);
        assert!((after.center().lng - 10.5).abs() < 1e-9);
    }
}
