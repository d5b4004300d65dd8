use serde::{Deserialize, Serialize};

/// A 2D point in integer database units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Point {
    pub x: i64,
    pub y: i64,
}

impl Point {
    pub fn new(x: i64, y: i64) -> Self {
        Self { x, y }
    }

    pub fn translate(&self, dx: i64, dy: i64) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
        }
    }
}

/// An axis-aligned bounding box as four integer coordinates.
///
/// `Eq` and `Hash` are derived so a box can key a map directly; two shapes
/// are considered coincident exactly when all four fields match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BBox {
    pub left: i64,
    pub bottom: i64,
    pub right: i64,
    pub top: i64,
}

impl BBox {
    pub fn new(left: i64, bottom: i64, right: i64, top: i64) -> Self {
        Self {
            left,
            bottom,
            right,
            top,
        }
    }

    pub fn from_points(points: &[Point]) -> Option<Self> {
        if points.is_empty() {
            return None;
        }
        let mut left = i64::MAX;
        let mut bottom = i64::MAX;
        let mut right = i64::MIN;
        let mut top = i64::MIN;
        for p in points {
            left = left.min(p.x);
            bottom = bottom.min(p.y);
            right = right.max(p.x);
            top = top.max(p.y);
        }
        Some(Self {
            left,
            bottom,
            right,
            top,
        })
    }

    pub fn width(&self) -> i64 {
        self.right - self.left
    }

    pub fn height(&self) -> i64 {
        self.top - self.bottom
    }

    pub fn contains_point(&self, p: &Point) -> bool {
        p.x >= self.left && p.x <= self.right && p.y >= self.bottom && p.y <= self.top
    }

    pub fn intersects(&self, other: &BBox) -> bool {
        self.left <= other.right
            && self.right >= other.left
            && self.bottom <= other.top
            && self.top >= other.bottom
    }

    pub fn union(&self, other: &BBox) -> Self {
        Self {
            left: self.left.min(other.left),
            bottom: self.bottom.min(other.bottom),
            right: self.right.max(other.right),
            top: self.top.max(other.top),
        }
    }
}

/// A rectangle defined by lower-left and upper-right corners.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rect {
    pub lower_left: Point,
    pub upper_right: Point,
}

impl Rect {
    pub fn new(x1: i64, y1: i64, x2: i64, y2: i64) -> Self {
        Self {
            lower_left: Point::new(x1.min(x2), y1.min(y2)),
            upper_right: Point::new(x1.max(x2), y1.max(y2)),
        }
    }

    pub fn bbox(&self) -> BBox {
        BBox::new(
            self.lower_left.x,
            self.lower_left.y,
            self.upper_right.x,
            self.upper_right.y,
        )
    }

    pub fn width(&self) -> i64 {
        self.upper_right.x - self.lower_left.x
    }

    pub fn height(&self) -> i64 {
        self.upper_right.y - self.lower_left.y
    }

    /// Area in database units².
    pub fn area(&self) -> i64 {
        self.width() * self.height()
    }
}

/// A polygon defined by a list of vertices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Polygon {
    pub vertices: Vec<Point>,
}

impl Polygon {
    pub fn new(vertices: Vec<Point>) -> Self {
        Self { vertices }
    }

    pub fn bbox(&self) -> Option<BBox> {
        BBox::from_points(&self.vertices)
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Area in database units² via the shoelace sum, truncated toward zero.
    pub fn area(&self) -> i64 {
        if self.vertices.len() < 3 {
            return 0;
        }
        let mut doubled: i128 = 0;
        let n = self.vertices.len();
        for i in 0..n {
            let a = self.vertices[i];
            let b = self.vertices[(i + 1) % n];
            doubled += a.x as i128 * b.y as i128 - b.x as i128 * a.y as i128;
        }
        (doubled.abs() / 2) as i64
    }
}

/// A path (wire) defined by a centerline and width in database units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Path {
    pub points: Vec<Point>,
    pub width: i64,
}

impl Path {
    pub fn new(points: Vec<Point>, width: i64) -> Self {
        Self { points, width }
    }

    /// Bounding box of the centerline expanded by half the width.
    pub fn bbox(&self) -> Option<BBox> {
        let half_w = self.width / 2;
        let spine = BBox::from_points(&self.points)?;
        Some(BBox::new(
            spine.left - half_w,
            spine.bottom - half_w,
            spine.right + half_w,
            spine.top + half_w,
        ))
    }

    pub fn length(&self) -> f64 {
        self.points
            .windows(2)
            .map(|w| {
                let dx = (w[1].x - w[0].x) as f64;
                let dy = (w[1].y - w[0].y) as f64;
                (dx * dx + dy * dy).sqrt()
            })
            .sum()
    }

    /// Approximate area in database units²: centerline length times width.
    pub fn area(&self) -> i64 {
        (self.length() * self.width as f64).round() as i64
    }
}

/// A text label anchored at a point. Not a geometric shape; carries no area.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Text {
    pub position: Point,
    pub string: String,
}

impl Text {
    pub fn new(position: Point, string: &str) -> Self {
        Self {
            position,
            string: string.to_string(),
        }
    }

    pub fn bbox(&self) -> BBox {
        BBox::new(self.position.x, self.position.y, self.position.x, self.position.y)
    }
}

/// A shape stored in a cell's per-layer shape list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Shape {
    Rect(Rect),
    Polygon(Polygon),
    Path(Path),
    Text(Text),
}

impl Shape {
    pub fn bbox(&self) -> Option<BBox> {
        match self {
            Shape::Rect(r) => Some(r.bbox()),
            Shape::Polygon(p) => p.bbox(),
            Shape::Path(p) => p.bbox(),
            Shape::Text(t) => Some(t.bbox()),
        }
    }

    /// Area in database units². Text labels report zero.
    pub fn area(&self) -> i64 {
        match self {
            Shape::Rect(r) => r.area(),
            Shape::Polygon(p) => p.area(),
            Shape::Path(p) => p.area(),
            Shape::Text(_) => 0,
        }
    }

    pub fn is_box(&self) -> bool {
        matches!(self, Shape::Rect(_))
    }

    pub fn is_polygon(&self) -> bool {
        matches!(self, Shape::Polygon(_))
    }

    pub fn is_path(&self) -> bool {
        matches!(self, Shape::Path(_))
    }

    pub fn is_text(&self) -> bool {
        matches!(self, Shape::Text(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rect_normalizes_corners() {
        let r = Rect::new(10, 10, 0, 0);
        assert_eq!(r.lower_left, Point::new(0, 0));
        assert_eq!(r.upper_right, Point::new(10, 10));
        assert_eq!(r.area(), 100);
    }

    #[test]
    fn test_bbox_is_a_map_key() {
        use std::collections::HashMap;
        let mut groups: HashMap<BBox, usize> = HashMap::new();
        let a = Rect::new(0, 0, 10, 10).bbox();
        let b = Rect::new(10, 10, 0, 0).bbox();
        *groups.entry(a).or_default() += 1;
        *groups.entry(b).or_default() += 1;
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[&a], 2);
    }

    #[test]
    fn test_bbox_intersection() {
        let a = BBox::new(0, 0, 10, 10);
        let b = BBox::new(5, 5, 15, 15);
        let c = BBox::new(20, 20, 30, 30);
        assert!(a.intersects(&b));
        assert!(!a.intersects(&c));
        assert_eq!(a.union(&b), BBox::new(0, 0, 15, 15));
    }

    #[test]
    fn test_polygon_area_shoelace() {
        // L-shaped polygon: 10x10 square minus a 5x5 corner.
        let poly = Polygon::new(vec![
            Point::new(0, 0),
            Point::new(10, 0),
            Point::new(10, 5),
            Point::new(5, 5),
            Point::new(5, 10),
            Point::new(0, 10),
        ]);
        assert_eq!(poly.area(), 75);
        assert_eq!(poly.bbox(), Some(BBox::new(0, 0, 10, 10)));
    }

    #[test]
    fn test_path_bbox_expands_by_half_width() {
        let path = Path::new(vec![Point::new(0, 0), Point::new(100, 0)], 10);
        assert_eq!(path.bbox(), Some(BBox::new(-5, -5, 105, 5)));
        assert_eq!(path.area(), 1000);
    }

    #[test]
    fn test_shape_kind_predicates() {
        let rect = Shape::Rect(Rect::new(0, 0, 1, 1));
        let text = Shape::Text(Text::new(Point::new(0, 0), "label"));
        assert!(rect.is_box());
        assert!(!rect.is_text());
        assert!(text.is_text());
        assert!(!text.is_box() && !text.is_polygon() && !text.is_path());
        assert_eq!(text.area(), 0);
    }
}
