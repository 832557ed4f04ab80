use crate::map::{Bounds, MapSurface, MarkerStyle, ShapeStyle};
use crate::model::{Field, HealthStatus, LatLng};
use log::{debug, warn};
use std::collections::{HashMap, HashSet};

/// 控制器为每个田块 id 记住的图元状态（arena 条目）
struct TrackedField {
    polygon: Vec<LatLng>,
    center: LatLng,
    status: HealthStatus,
    popup: String,
    selected: bool,
}

/// 地图表面控制器
///
/// 每个田块 id 恰好对应一组图元（多边形 + 标记 + 气泡）。
/// `reconcile` 按 id 做增量对账：消失的删、新增的建、存活的只改样式，
/// 不整体重建，避免丢掉用户的交互状态。选中 id 由外部（协调器）持有，
/// 控制器只通过回调上报点击，从不自己改选中态。
pub struct MapController {
    surface: Option<Box<dyn MapSurface>>,
    tracked: HashMap<String, TrackedField>,
    hovered: Option<String>,
    on_select: Option<Box<dyn Fn(&str) + Send>>,
}

impl MapController {
    pub fn new() -> Self {
        Self {
            surface: None,
            tracked: HashMap::new(),
            hovered: None,
            on_select: None,
        }
    }

    /// 创建持久地图实例。重复调用是幂等的 no-op。
    pub fn initialize(&mut self, surface: Box<dyn MapSurface>) {
        if self.surface.is_some() {
            debug!("地图已初始化，忽略重复 initialize");
            return;
        }
        self.surface = Some(surface);
    }

    pub fn is_initialized(&self) -> bool {
        self.surface.is_some()
    }

    /// 设置点击上报回调（唯一的选中入口）
    pub fn set_on_select(&mut self, cb: impl Fn(&str) + Send + 'static) {
        self.on_select = Some(Box::new(cb));
    }

    /// 按最新田块列表与选中 id 对账图元集合。O(n)。
    /// 未初始化时是 no-op（调用方应当先 initialize，这里容忍乱序）。
    pub fn reconcile(&mut self, fields: &[Field], selected_id: Option<&str>) {
        let Some(surface) = self.surface.as_mut() else {
            warn!("reconcile 在 initialize 之前被调用，忽略");
            return;
        };

        // 1) 删掉已经不存在的 id
        let incoming: HashSet<&str> = fields.iter().map(|f| f.id.as_str()).collect();
        let stale: Vec<String> = self
            .tracked
            .keys()
            .filter(|id| !incoming.contains(id.as_str()))
            .cloned()
            .collect();
        for id in stale {
            surface.remove_group(&id);
            self.tracked.remove(&id);
            if self.hovered.as_deref() == Some(id.as_str()) {
                self.hovered = None;
            }
        }

        // 2) 新建 / 3) 原地更新
        for field in fields {
            if let Err(e) = field.validate() {
                warn!("跳过非法田块 [{}]: {}", field.id, e);
                continue;
            }
            let selected = selected_id == Some(field.id.as_str());
            let hovered = self.hovered.as_deref() == Some(field.id.as_str());
            let shape = ShapeStyle::for_field(field.health_status, selected, hovered);
            let marker = MarkerStyle::for_field(field.health_status, selected, hovered);
            let popup = popup_content(field);

            match self.tracked.get_mut(&field.id) {
                None => {
                    surface.add_polygon(&field.id, &field.coordinates, shape);
                    surface.add_marker(&field.id, field.center, marker);
                    surface.bind_popup(&field.id, popup.clone());
                    self.tracked.insert(
                        field.id.clone(),
                        TrackedField {
                            polygon: field.coordinates.clone(),
                            center: field.center,
                            status: field.health_status,
                            popup,
                            selected,
                        },
                    );
                }
                Some(entry) => {
                    surface.set_polygon_style(&field.id, shape);
                    surface.set_marker_style(&field.id, marker);
                    if entry.popup != popup {
                        surface.bind_popup(&field.id, popup.clone());
                        entry.popup = popup;
                    }
                    entry.polygon = field.coordinates.clone();
                    entry.center = field.center;
                    entry.status = field.health_status;
                    entry.selected = selected;
                }
            }

            // 4) 选中项：平移视野并打开气泡
            if selected {
                surface.pan_to(field.center);
                surface.open_popup(&field.id);
            }
        }

        if selected_id.is_none() {
            surface.close_popup();
        }
    }

    /// 悬停切换。进入加重显示，离开恢复——除非该田块处于选中态
    /// （选中样式优先，样式计算里已经体现）。
    pub fn set_hover(&mut self, id: Option<&str>) {
        if self.hovered.as_deref() == id {
            return;
        }
        let previous = self.hovered.take();
        self.hovered = id.map(|s| s.to_string());

        let Some(surface) = self.surface.as_mut() else {
            return;
        };
        for (target, hovered_now) in [(previous, false), (self.hovered.clone(), true)] {
            let Some(target) = target else { continue };
            if let Some(entry) = self.tracked.get(&target) {
                let shape = ShapeStyle::for_field(entry.status, entry.selected, hovered_now);
                let marker = MarkerStyle::for_field(entry.status, entry.selected, hovered_now);
                surface.set_polygon_style(&target, shape);
                surface.set_marker_style(&target, marker);
            }
        }
    }

    pub fn hovered(&self) -> Option<&str> {
        self.hovered.as_deref()
    }

    /// 命中测试：先看多边形内部，再看标记点附近
    pub fn hit_test(&self, p: LatLng, tolerance: f64) -> Option<String> {
        for (id, entry) in &self.tracked {
            if point_in_polygon(p, &entry.polygon) {
                return Some(id.clone());
            }
        }
        self.tracked
            .iter()
            .find(|(_, entry)| {
                (entry.center.lat - p.lat).abs() <= tolerance
                    && (entry.center.lng - p.lng).abs() <= tolerance
            })
            .map(|(id, _)| id.clone())
    }

    /// 点击处理：命中则通过回调上报 id，控制器自身不改选中态
    pub fn click_at(&self, p: LatLng, tolerance: f64) -> Option<String> {
        let hit = self.hit_test(p, tolerance)?;
        if let Some(cb) = &self.on_select {
            cb(&hit);
        }
        Some(hit)
    }

    /// 视野覆盖全部田块（带边距）。只在一代新数据首次加载时调用，
    /// 对账时不调用，避免跟用户的平移/缩放打架。
    pub fn fit_all(&mut self, fields: &[Field]) {
        let Some(surface) = self.surface.as_mut() else {
            return;
        };
        let all = fields.iter().flat_map(|f| f.coordinates.iter().copied());
        if let Some(bounds) = Bounds::of(all) {
            surface.fit_bounds(bounds.padded(0.15));
        }
    }

    /// 释放地图实例与全部图元。未初始化时调用也安全。
    pub fn teardown(&mut self) {
        if let Some(mut surface) = self.surface.take() {
            surface.clear();
        }
        self.tracked.clear();
        self.hovered = None;
    }

    pub fn tracked_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.tracked.keys().cloned().collect();
        ids.sort();
        ids
    }
}

impl Default for MapController {
    fn default() -> Self {
        Self::new()
    }
}

fn popup_content(field: &Field) -> String {
    format!(
        "{}\n区域: {}  面积: {:.1} 公顷\n胁迫指数: {}/100 ({})",
        field.name,
        field.region,
        field.area_hectares,
        field.stress_score as i64,
        field.health_status.label()
    )
}

/// 射线法判断点是否落在多边形内
fn point_in_polygon(p: LatLng, polygon: &[LatLng]) -> bool {
    if polygon.len() < 3 {
        return false;
    }
    let mut inside = false;
    let mut j = polygon.len() - 1;
    for i in 0..polygon.len() {
        let (a, b) = (polygon[i], polygon[j]);
        if (a.lat > p.lat) != (b.lat > p.lat) {
            let x = (b.lng - a.lng) * (p.lat - a.lat) / (b.lat - a.lat) + a.lng;
            if p.lng < x {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::MarkerStyle;
    use crate::model::field::tests::{sample_field, sample_set};
    use std::sync::mpsc;

    /// 测试用表面：记录每类调用次数与最近的样式
    #[derive(Default)]
    struct RecordingSurface {
        adds: usize,
        removes: usize,
        restyles: usize,
        pans: Vec<LatLng>,
        fits: Vec<Bounds>,
        opened_popup: Option<String>,
        popup_closed: bool,
        cleared: bool,
        last_shape: HashMap<String, ShapeStyle>,
        last_marker: HashMap<String, MarkerStyle>,
    }

    impl MapSurface for RecordingSurface {
        fn add_polygon(&mut self, id: &str, _points: &[LatLng], style: ShapeStyle) {
            self.adds += 1;
            self.last_shape.insert(id.to_string(), style);
        }
        fn add_marker(&mut self, id: &str, _at: LatLng, style: MarkerStyle) {
            self.last_marker.insert(id.to_string(), style);
        }
        fn set_polygon_style(&mut self, id: &str, style: ShapeStyle) {
            self.restyles += 1;
            self.last_shape.insert(id.to_string(), style);
        }
        fn set_marker_style(&mut self, id: &str, style: MarkerStyle) {
            self.last_marker.insert(id.to_string(), style);
        }
        fn bind_popup(&mut self, _id: &str, _content: String) {}
        fn open_popup(&mut self, id: &str) {
            self.opened_popup = Some(id.to_string());
        }
        fn close_popup(&mut self) {
            self.popup_closed = true;
        }
        fn remove_group(&mut self, _id: &str) {
            self.removes += 1;
        }
        fn pan_to(&mut self, center: LatLng) {
            self.pans.push(center);
        }
        fn fit_bounds(&mut self, bounds: Bounds) {
            self.fits.push(bounds);
        }
        fn clear(&mut self) {
            self.cleared = true;
        }
    }

    /// 共享句柄，便于断言时窥视内部计数
    struct SharedSurface(std::sync::Arc<std::sync::Mutex<RecordingSurface>>);

    impl MapSurface for SharedSurface {
        fn add_polygon(&mut self, id: &str, points: &[LatLng], style: ShapeStyle) {
            self.0.lock().unwrap().add_polygon(id, points, style)
        }
        fn add_marker(&mut self, id: &str, at: LatLng, style: MarkerStyle) {
            self.0.lock().unwrap().add_marker(id, at, style)
        }
        fn set_polygon_style(&mut self, id: &str, style: ShapeStyle) {
            self.0.lock().unwrap().set_polygon_style(id, style)
        }
        fn set_marker_style(&mut self, id: &str, style: MarkerStyle) {
            self.0.lock().unwrap().set_marker_style(id, style)
        }
        fn bind_popup(&mut self, id: &str, content: String) {
            self.0.lock().unwrap().bind_popup(id, content)
        }
        fn open_popup(&mut self, id: &str) {
            self.0.lock().unwrap().open_popup(id)
        }
        fn close_popup(&mut self) {
            self.0.lock().unwrap().close_popup()
        }
        fn remove_group(&mut self, id: &str) {
            self.0.lock().unwrap().remove_group(id)
        }
        fn pan_to(&mut self, center: LatLng) {
            self.0.lock().unwrap().pan_to(center)
        }
        fn fit_bounds(&mut self, bounds: Bounds) {
            self.0.lock().unwrap().fit_bounds(bounds)
        }
        fn clear(&mut self) {
            self.0.lock().unwrap().clear()
        }
    }

    fn controller_with_recorder() -> (
        MapController,
        std::sync::Arc<std::sync::Mutex<RecordingSurface>>,
    ) {
        let shared = std::sync::Arc::new(std::sync::Mutex::new(RecordingSurface::default()));
        let mut ctl = MapController::new();
        ctl.initialize(Box::new(SharedSurface(shared.clone())));
        (ctl, shared)
    }

    #[test]
    fn reconcile_before_initialize_is_noop() {
        let mut ctl = MapController::new();
        let set = sample_set(&[("a", 10.0)]);
        ctl.reconcile(&set.fields, None);
        assert!(ctl.tracked_ids().is_empty());
    }

    #[test]
    fn initialize_is_idempotent() {
        let (mut ctl, first) = controller_with_recorder();
        let other = std::sync::Arc::new(std::sync::Mutex::new(RecordingSurface::default()));
        ctl.initialize(Box::new(SharedSurface(other.clone())));

        let set = sample_set(&[("a", 10.0)]);
        ctl.reconcile(&set.fields, None);
        // 第二个 surface 不应收到任何调用
        assert_eq!(first.lock().unwrap().adds, 1);
        assert_eq!(other.lock().unwrap().adds, 0);
    }

    #[test]
    fn reconcile_is_idempotent_and_bounded() {
        let (mut ctl, rec) = controller_with_recorder();
        let set = sample_set(&[("a", 10.0), ("b", 45.0), ("c", 80.0)]);

        ctl.reconcile(&set.fields, None);
        let ids_first = ctl.tracked_ids();
        assert_eq!(rec.lock().unwrap().adds, 3);

        ctl.reconcile(&set.fields, None);
        let r = rec.lock().unwrap();
        // 已跟踪 id 不重复创建，更新次数不超过 n
        assert_eq!(r.adds, 3);
        assert_eq!(r.removes, 0);
        assert!(r.restyles <= 3);
        drop(r);
        assert_eq!(ctl.tracked_ids(), ids_first);
    }

    #[test]
    fn reconcile_removes_vanished_ids() {
        let (mut ctl, rec) = controller_with_recorder();
        let set = sample_set(&[("a", 10.0), ("b", 45.0), ("c", 80.0)]);
        ctl.reconcile(&set.fields, None);

        let smaller = sample_set(&[("a", 12.0), ("c", 70.0)]);
        ctl.reconcile(&smaller.fields, None);
        assert_eq!(rec.lock().unwrap().removes, 1);
        assert_eq!(ctl.tracked_ids(), vec!["a".to_string(), "c".to_string()]);
    }

    #[test]
    fn selection_pans_and_opens_popup() {
        let (mut ctl, rec) = controller_with_recorder();
        let set = sample_set(&[("a", 10.0), ("b", 45.0)]);
        ctl.reconcile(&set.fields, Some("b"));

        let r = rec.lock().unwrap();
        assert_eq!(r.opened_popup.as_deref(), Some("b"));
        assert_eq!(r.pans.last(), Some(&set.fields[1].center));
        // 选中样式带虚线描边
        assert!(r.last_shape["b"].dashed);
        assert!(!r.last_shape["a"].dashed);
    }

    #[test]
    fn clearing_selection_closes_popup() {
        let (mut ctl, rec) = controller_with_recorder();
        let set = sample_set(&[("a", 10.0)]);
        ctl.reconcile(&set.fields, Some("a"));
        ctl.reconcile(&set.fields, None);
        assert!(rec.lock().unwrap().popup_closed);
    }

    #[test]
    fn hover_emphasizes_and_reverts() {
        let (mut ctl, rec) = controller_with_recorder();
        let set = sample_set(&[("a", 10.0), ("b", 45.0)]);
        ctl.reconcile(&set.fields, None);

        ctl.set_hover(Some("a"));
        assert_eq!(rec.lock().unwrap().last_shape["a"].fill_opacity, 0.4);
        ctl.set_hover(None);
        assert_eq!(rec.lock().unwrap().last_shape["a"].fill_opacity, 0.15);
    }

    #[test]
    fn selected_emphasis_survives_hover_exit() {
        let (mut ctl, rec) = controller_with_recorder();
        let set = sample_set(&[("a", 10.0), ("b", 45.0)]);
        ctl.reconcile(&set.fields, Some("a"));

        ctl.set_hover(Some("a"));
        ctl.set_hover(None);
        // 离开悬停后选中样式保持不变
        let r = rec.lock().unwrap();
        assert!(r.last_shape["a"].dashed);
        assert_eq!(r.last_shape["a"].opacity, 1.0);
    }

    #[test]
    fn hit_test_and_click_report_field_id() {
        let (mut ctl, _rec) = controller_with_recorder();
        let set = sample_set(&[("a", 10.0)]);
        ctl.reconcile(&set.fields, None);

        let inside = LatLng::new(34.825, 10.705);
        let outside = LatLng::new(20.0, 20.0);
        assert_eq!(ctl.hit_test(inside, 0.001).as_deref(), Some("a"));
        assert_eq!(ctl.hit_test(outside, 0.001), None);

        let (tx, rx) = mpsc::channel();
        ctl.set_on_select(move |id| {
            let _ = tx.send(id.to_string());
        });
        assert_eq!(ctl.click_at(inside, 0.001).as_deref(), Some("a"));
        assert_eq!(rx.recv().unwrap(), "a");
    }

    #[test]
    fn invalid_record_is_skipped_not_rendered() {
        let (mut ctl, rec) = controller_with_recorder();
        let mut bad = sample_field("broken", 40.0);
        bad.coordinates.truncate(2);
        ctl.reconcile(&[bad], None);
        assert_eq!(rec.lock().unwrap().adds, 0);
        assert!(ctl.tracked_ids().is_empty());
    }

    #[test]
    fn fit_all_covers_every_vertex() {
        let (mut ctl, rec) = controller_with_recorder();
        let set = sample_set(&[("a", 10.0)]);
        ctl.reconcile(&set.fields, None);
        ctl.fit_all(&set.fields);

        let r = rec.lock().unwrap();
        let bounds = r.fits.last().unwrap();
        for p in &set.fields[0].coordinates {
            assert!(bounds.contains(*p));
        }
    }

    #[test]
    fn teardown_is_safe_and_releases_everything() {
        let mut ctl = MapController::new();
        ctl.teardown(); // 未初始化也不崩

        let (mut ctl, rec) = controller_with_recorder();
        let set = sample_set(&[("a", 10.0)]);
        ctl.reconcile(&set.fields, None);
        ctl.teardown();
        assert!(rec.lock().unwrap().cleared);
        assert!(ctl.tracked_ids().is_empty());
        assert!(!ctl.is_initialized());
    }

    #[test]
    fn point_in_polygon_basics() {
        let square = vec![
            LatLng::new(0.0, 0.0),
            LatLng::new(0.0, 2.0),
            LatLng::new(2.0, 2.0),
            LatLng::new(2.0, 0.0),
        ];
        assert!(point_in_polygon(LatLng::new(1.0, 1.0), &square));
        assert!(!point_in_polygon(LatLng::new(3.0, 1.0), &square));
    }
}
