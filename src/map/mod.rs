pub mod canvas;
pub mod controller;
pub mod surface;

use crate::model::{HealthStatus, LatLng};
use ratatui::style::Color;

pub use canvas::{CanvasState, CanvasSurface};
pub use controller::MapController;
pub use surface::MapSurface;

/// 经纬度包围盒
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub south: f64,
    pub west: f64,
    pub north: f64,
    pub east: f64,
}

impl Bounds {
    pub fn of(points: impl IntoIterator<Item = LatLng>) -> Option<Self> {
        let mut iter = points.into_iter();
        let first = iter.next()?;
        let mut b = Bounds {
            south: first.lat,
            west: first.lng,
            north: first.lat,
            east: first.lng,
        };
        for p in iter {
            b.extend(p);
        }
        Some(b)
    }

    pub fn extend(&mut self, p: LatLng) {
        self.south = self.south.min(p.lat);
        self.north = self.north.max(p.lat);
        self.west = self.west.min(p.lng);
        self.east = self.east.max(p.lng);
    }

    /// 四周留出边距（取跨度的比例，跨度为零时用最小跨度兜底）
    pub fn padded(&self, ratio: f64) -> Bounds {
        let dlat = ((self.north - self.south) * ratio).max(0.01);
        let dlng = ((self.east - self.west) * ratio).max(0.01);
        Bounds {
            south: self.south - dlat,
            west: self.west - dlng,
            north: self.north + dlat,
            east: self.east + dlng,
        }
    }

    pub fn center(&self) -> LatLng {
        LatLng::new((self.south + self.north) / 2.0, (self.west + self.east) / 2.0)
    }

    pub fn contains(&self, p: LatLng) -> bool {
        p.lat >= self.south && p.lat <= self.north && p.lng >= self.west && p.lng <= self.east
    }
}

/// 多边形描边/填充样式
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShapeStyle {
    pub color: Color,
    pub weight: u8,
    pub opacity: f64,
    pub fill_opacity: f64,
    pub dashed: bool,
}

impl ShapeStyle {
    /// 样式只在这里算，选中态优先于悬停态
    pub fn for_field(status: HealthStatus, selected: bool, hovered: bool) -> Self {
        let color = status.color();
        if selected {
            ShapeStyle {
                color,
                weight: 3,
                opacity: 1.0,
                fill_opacity: 0.3,
                dashed: true,
            }
        } else if hovered {
            ShapeStyle {
                color,
                weight: 3,
                opacity: 0.9,
                fill_opacity: 0.4,
                dashed: false,
            }
        } else {
            ShapeStyle {
                color,
                weight: 2,
                opacity: 0.7,
                fill_opacity: 0.15,
                dashed: false,
            }
        }
    }
}

/// 标记点样式
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarkerStyle {
    pub color: Color,
    pub size: u8,
    pub pulsing: bool,
}

impl MarkerStyle {
    pub fn for_field(status: HealthStatus, selected: bool, hovered: bool) -> Self {
        let emphasized = selected || hovered;
        MarkerStyle {
            color: status.color(),
            size: if emphasized { 24 } else { 16 },
            pulsing: selected,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounds_cover_all_points() {
        let b = Bounds::of([
            LatLng::new(34.0, 10.0),
            LatLng::new(35.5, 10.8),
            LatLng::new(34.6, 9.9),
        ])
        .unwrap();
        assert_eq!(b.south, 34.0);
        assert_eq!(b.north, 35.5);
        assert_eq!(b.west, 9.9);
        assert_eq!(b.east, 10.8);
        assert!(b.contains(LatLng::new(34.6, 10.3)));
        assert!(!b.contains(LatLng::new(36.0, 10.3)));
    }

    #[test]
    fn bounds_of_empty_is_none() {
        assert!(Bounds::of([]).is_none());
    }

    #[test]
    fn selected_style_beats_hover() {
        let sel = ShapeStyle::for_field(HealthStatus::Warning, true, true);
        let hover = ShapeStyle::for_field(HealthStatus::Warning, false, true);
        let plain = ShapeStyle::for_field(HealthStatus::Warning, false, false);
        assert!(sel.dashed);
        assert_eq!(sel.opacity, 1.0);
        assert!(hover.fill_opacity > plain.fill_opacity);
        assert!(hover.weight > plain.weight);
    }

    #[test]
    fn styles_use_status_color_mapping() {
        for status in [
            HealthStatus::Healthy,
            HealthStatus::Warning,
            HealthStatus::Critical,
        ] {
            assert_eq!(ShapeStyle::for_field(status, false, false).color, status.color());
            assert_eq!(MarkerStyle::for_field(status, true, false).color, status.color());
        }
    }
}
