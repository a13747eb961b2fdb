//! Still-image analysis over an 8-bit grayscale raster.
//!
//! Dark pixels are grouped into 4-connected components; large components
//! become visual elements typed by the aspect ratio of their bounding box.
//! Ruling lines and round filled shapes hint at tables and pie charts.

use crate::MediaError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Pixels darker than this count as ink.
const DARK_THRESHOLD: u8 = 128;
/// Components smaller than this share of the image are noise.
const MIN_ELEMENT_AREA_FRACTION: f64 = 0.01;
/// A ruling line spans at least this share of the image side.
const MIN_RULE_FRACTION: f64 = 0.5;
const MIN_RULE_PIXELS: usize = 8;
const TABLE_RULE_COUNT: usize = 10;
/// π/4: filled circle inside its square bounding box.
const DISC_FILL_RATIO: f64 = std::f64::consts::FRAC_PI_4;
const DISC_FILL_TOLERANCE: f64 = 0.08;
const MIN_DISC_SIDE: u32 = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrayImage {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl GrayImage {
    pub fn new(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self, MediaError> {
        let expected = width as usize * height as usize;
        if width == 0 || height == 0 {
            return Err(MediaError::Decode("image has zero size".to_string()));
        }
        if pixels.len() != expected {
            return Err(MediaError::Decode(format!(
                "expected {expected} pixels for {width}x{height}, got {}",
                pixels.len()
            )));
        }
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    /// Uniform image, handy as a canvas.
    pub fn filled(width: u32, height: u32, value: u8) -> Result<Self, MediaError> {
        Self::new(width, height, vec![value; width as usize * height as usize])
    }

    /// Decode a binary (`P5`) or ASCII (`P2`) PGM file.
    pub fn from_pgm(bytes: &[u8]) -> Result<Self, MediaError> {
        let mut cursor = PgmCursor { bytes, pos: 0 };
        let magic = cursor.token()?;
        let binary = match magic.as_str() {
            "P5" => true,
            "P2" => false,
            other => {
                return Err(MediaError::Unsupported(format!("not a PGM image ({other})")));
            }
        };
        let width = cursor.number()?;
        let height = cursor.number()?;
        let maxval = cursor.number()?;
        if maxval == 0 || maxval > 255 {
            return Err(MediaError::Unsupported(format!("PGM maxval {maxval}")));
        }
        let count = width as usize * height as usize;
        let scale = |v: u32| ((v.min(maxval) * 255) / maxval) as u8;

        let pixels = if binary {
            // Exactly one whitespace byte separates the header from the raster.
            let start = cursor.pos + 1;
            let raster = bytes
                .get(start..start + count)
                .ok_or_else(|| MediaError::Decode("truncated PGM raster".to_string()))?;
            raster.iter().map(|&b| scale(u32::from(b))).collect()
        } else {
            (0..count)
                .map(|_| cursor.number().map(scale))
                .collect::<Result<Vec<_>, _>>()?
        };
        Self::new(width, height, pixels)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn get(&self, x: u32, y: u32) -> u8 {
        self.pixels[y as usize * self.width as usize + x as usize]
    }

    pub fn set(&mut self, x: u32, y: u32, value: u8) {
        let idx = y as usize * self.width as usize + x as usize;
        self.pixels[idx] = value;
    }

    /// Nearest-neighbour resize.
    pub fn resize_nearest(&self, width: u32, height: u32) -> GrayImage {
        let mut pixels = Vec::with_capacity(width as usize * height as usize);
        for y in 0..height {
            let sy = (u64::from(y) * u64::from(self.height) / u64::from(height)) as u32;
            for x in 0..width {
                let sx = (u64::from(x) * u64::from(self.width) / u64::from(width)) as u32;
                pixels.push(self.get(sx, sy));
            }
        }
        GrayImage {
            width,
            height,
            pixels,
        }
    }

    /// Mean absolute per-pixel difference; images must share dimensions.
    pub fn mean_abs_diff(&self, other: &GrayImage) -> f64 {
        let total: u64 = self
            .pixels
            .iter()
            .zip(&other.pixels)
            .map(|(a, b)| u64::from(a.abs_diff(*b)))
            .sum();
        total as f64 / self.pixels.len().max(1) as f64
    }

    fn is_dark(&self, x: u32, y: u32) -> bool {
        self.get(x, y) < DARK_THRESHOLD
    }
}

struct PgmCursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl PgmCursor<'_> {
    fn token(&mut self) -> Result<String, MediaError> {
        loop {
            match self.bytes.get(self.pos) {
                Some(b'#') => {
                    while self.bytes.get(self.pos).is_some_and(|b| *b != b'\n') {
                        self.pos += 1;
                    }
                }
                Some(b) if b.is_ascii_whitespace() => self.pos += 1,
                Some(_) => break,
                None => return Err(MediaError::Decode("truncated PGM header".to_string())),
            }
        }
        let start = self.pos;
        while self
            .bytes
            .get(self.pos)
            .is_some_and(|b| !b.is_ascii_whitespace())
        {
            self.pos += 1;
        }
        Ok(String::from_utf8_lossy(&self.bytes[start..self.pos]).into_owned())
    }

    fn number(&mut self) -> Result<u32, MediaError> {
        let tok = self.token()?;
        tok.parse()
            .map_err(|_| MediaError::Decode(format!("bad PGM number `{tok}`")))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VisualElementKind {
    Graph,
    Table,
    Diagram,
    Unknown,
}

impl VisualElementKind {
    /// Shape class and detection confidence for a bounding box.
    pub fn classify(width: u32, height: u32) -> (Self, f64) {
        let aspect = f64::from(width) / f64::from(height.max(1));
        if (0.8..=1.2).contains(&aspect) {
            (Self::Graph, 0.7)
        } else if aspect > 1.5 {
            (Self::Table, 0.6)
        } else if aspect < 0.7 {
            (Self::Diagram, 0.5)
        } else {
            (Self::Unknown, 0.0)
        }
    }

    /// Czech noun in the accusative, as used in "Obrázek obsahuje …".
    pub fn label(self) -> &'static str {
        match self {
            Self::Graph => "graf",
            Self::Table => "tabulku",
            Self::Diagram => "diagram",
            Self::Unknown => "neidentifikovaný vizuální prvek",
        }
    }

    fn plural_genitive(self) -> &'static str {
        match self {
            Self::Graph => "grafů",
            Self::Table => "tabulek",
            Self::Diagram => "diagramů",
            Self::Unknown => "neidentifikovaných vizuálních prvků",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisualElement {
    #[serde(rename = "type")]
    pub kind: VisualElementKind,
    pub confidence: f64,
    pub bounding_box: BoundingBox,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChartKind {
    PieChart,
    Table,
}

/// Everything learned from one image. Empty with `error` set on failure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImageAnalysis {
    pub extracted_text: String,
    pub visual_elements: Vec<VisualElement>,
    pub chart_signals: Vec<ChartKind>,
    pub summary: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ImageAnalysis {
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::default()
        }
    }
}

struct Component {
    min_x: u32,
    min_y: u32,
    max_x: u32,
    max_y: u32,
    pixels: usize,
}

impl Component {
    fn width(&self) -> u32 {
        self.max_x - self.min_x + 1
    }

    fn height(&self) -> u32 {
        self.max_y - self.min_y + 1
    }

    fn fill_ratio(&self) -> f64 {
        self.pixels as f64 / (f64::from(self.width()) * f64::from(self.height()))
    }
}

fn components(img: &GrayImage) -> Vec<Component> {
    let (w, h) = (img.width, img.height);
    let mut seen = vec![false; img.pixels.len()];
    let mut out = Vec::new();
    let mut stack = Vec::new();

    for y in 0..h {
        for x in 0..w {
            let idx = (y * w + x) as usize;
            if seen[idx] || !img.is_dark(x, y) {
                continue;
            }
            seen[idx] = true;
            stack.push((x, y));
            let mut comp = Component {
                min_x: x,
                min_y: y,
                max_x: x,
                max_y: y,
                pixels: 0,
            };
            while let Some((cx, cy)) = stack.pop() {
                comp.pixels += 1;
                comp.min_x = comp.min_x.min(cx);
                comp.max_x = comp.max_x.max(cx);
                comp.min_y = comp.min_y.min(cy);
                comp.max_y = comp.max_y.max(cy);

                let neighbours = [
                    (cx.wrapping_sub(1), cy),
                    (cx + 1, cy),
                    (cx, cy.wrapping_sub(1)),
                    (cx, cy + 1),
                ];
                for (nx, ny) in neighbours {
                    if nx >= w || ny >= h {
                        continue;
                    }
                    let nidx = (ny * w + nx) as usize;
                    if !seen[nidx] && img.is_dark(nx, ny) {
                        seen[nidx] = true;
                        stack.push((nx, ny));
                    }
                }
            }
            out.push(comp);
        }
    }
    out
}

/// Visual elements from the dark components of `img`.
pub fn detect_elements(img: &GrayImage) -> Vec<VisualElement> {
    let min_area = f64::from(img.width) * f64::from(img.height) * MIN_ELEMENT_AREA_FRACTION;
    components(img)
        .into_iter()
        .filter(|c| f64::from(c.width()) * f64::from(c.height()) > min_area)
        .map(|c| {
            let (kind, confidence) = VisualElementKind::classify(c.width(), c.height());
            VisualElement {
                kind,
                confidence,
                bounding_box: BoundingBox {
                    x: c.min_x,
                    y: c.min_y,
                    width: c.width(),
                    height: c.height(),
                },
            }
        })
        .collect()
}

/// Number of distinct ruling lines, horizontal plus vertical.
fn ruling_lines(img: &GrayImage) -> usize {
    let longest_run = |len: u32, dark: &dyn Fn(u32) -> bool| {
        let (mut best, mut cur) = (0usize, 0usize);
        for i in 0..len {
            if dark(i) {
                cur += 1;
                best = best.max(cur);
            } else {
                cur = 0;
            }
        }
        best
    };
    let count_lines = |outer: u32, inner: u32, dark: &dyn Fn(u32, u32) -> bool| {
        let min_run = ((f64::from(inner) * MIN_RULE_FRACTION) as usize).max(MIN_RULE_PIXELS);
        let mut lines = 0;
        let mut in_line = false;
        for o in 0..outer {
            let is_rule = longest_run(inner, &|i| dark(o, i)) >= min_run;
            if is_rule && !in_line {
                lines += 1;
            }
            in_line = is_rule;
        }
        lines
    };

    let horizontal = count_lines(img.height, img.width, &|y, x| img.is_dark(x, y));
    let vertical = count_lines(img.width, img.height, &|x, y| img.is_dark(x, y));
    horizontal + vertical
}

/// Table and pie-chart hints.
pub fn detect_charts(img: &GrayImage) -> Vec<ChartKind> {
    let mut out = Vec::new();
    let has_disc = components(img).iter().any(|c| {
        let aspect = f64::from(c.width()) / f64::from(c.height());
        c.width().min(c.height()) >= MIN_DISC_SIDE
            && (0.8..=1.2).contains(&aspect)
            && (c.fill_ratio() - DISC_FILL_RATIO).abs() <= DISC_FILL_TOLERANCE
    });
    if has_disc {
        out.push(ChartKind::PieChart);
    }
    if ruling_lines(img) > TABLE_RULE_COUNT {
        out.push(ChartKind::Table);
    }
    out
}

/// Czech one-paragraph description of an analysed image.
pub fn summarize(text: &str, elements: &[VisualElement], charts: &[ChartKind]) -> String {
    let mut parts = Vec::new();

    let chars = text.chars().count();
    parts.push(match chars {
        0 => "Obrázek neobsahuje žádný čitelný text.".to_string(),
        n if n > 500 => format!("Obrázek obsahuje velké množství textu ({n} znaků)."),
        n if n > 100 => format!("Obrázek obsahuje střední množství textu ({n} znaků)."),
        n => format!("Obrázek obsahuje malé množství textu ({n} znaků)."),
    });

    let mut counts: BTreeMap<VisualElementKind, usize> = BTreeMap::new();
    for e in elements {
        *counts.entry(e.kind).or_default() += 1;
    }
    for (kind, n) in counts {
        parts.push(format!("Obrázek obsahuje {n} {}.", kind.plural_genitive()));
    }

    if charts.contains(&ChartKind::PieChart) {
        parts.push("Obrázek obsahuje koláčový graf.".to_string());
    }
    if charts.contains(&ChartKind::Table) {
        parts.push("Obrázek obsahuje tabulku s daty.".to_string());
    }

    parts.join(" ")
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn disc(size: u32, radius: f64) -> GrayImage {
        let mut img = GrayImage::filled(size, size, 255).unwrap();
        let c = f64::from(size) / 2.0;
        for y in 0..size {
            for x in 0..size {
                let (dx, dy) = (f64::from(x) + 0.5 - c, f64::from(y) + 0.5 - c);
                if dx * dx + dy * dy <= radius * radius {
                    img.set(x, y, 0);
                }
            }
        }
        img
    }

    fn grid(width: u32, height: u32, rows: u32) -> GrayImage {
        let mut img = GrayImage::filled(width, height, 255).unwrap();
        let step = height / rows;
        for r in 0..rows {
            let y = r * step;
            for x in 0..width {
                img.set(x, y, 0);
            }
        }
        // Side rules tie the rows into one component.
        for y in 0..(rows - 1) * step + 1 {
            img.set(0, y, 0);
            img.set(width - 1, y, 0);
        }
        img
    }

    #[test]
    fn rejects_mismatched_raster() {
        assert!(GrayImage::new(4, 4, vec![0; 15]).is_err());
        assert!(GrayImage::new(0, 4, Vec::new()).is_err());
    }

    #[test]
    fn aspect_ratio_thresholds() {
        assert_eq!(VisualElementKind::classify(100, 100), (VisualElementKind::Graph, 0.7));
        assert_eq!(VisualElementKind::classify(200, 100), (VisualElementKind::Table, 0.6));
        assert_eq!(VisualElementKind::classify(50, 100), (VisualElementKind::Diagram, 0.5));
        assert_eq!(VisualElementKind::classify(130, 100).0, VisualElementKind::Unknown);
    }

    #[test]
    fn filled_disc_is_a_graph_and_pie_chart() {
        let img = disc(100, 30.0);
        let elements = detect_elements(&img);
        assert_eq!(elements.len(), 1);
        assert_eq!(elements[0].kind, VisualElementKind::Graph);
        assert_eq!(detect_charts(&img), vec![ChartKind::PieChart]);
    }

    #[test]
    fn ruled_grid_is_a_table() {
        let img = grid(240, 120, 12);
        let elements = detect_elements(&img);
        assert_eq!(elements.len(), 1);
        assert_eq!(elements[0].kind, VisualElementKind::Table);
        assert!(detect_charts(&img).contains(&ChartKind::Table));
    }

    #[test]
    fn specks_are_ignored() {
        let mut img = GrayImage::filled(100, 100, 255).unwrap();
        img.set(10, 10, 0);
        img.set(11, 10, 0);
        assert!(detect_elements(&img).is_empty());
        assert!(detect_charts(&img).is_empty());
    }

    #[test]
    fn decodes_ascii_and_binary_pgm() {
        let ascii = b"P2\n# comment\n2 2\n15\n0 15\n15 0\n";
        let img = GrayImage::from_pgm(ascii).unwrap();
        assert_eq!((img.width(), img.height()), (2, 2));
        assert_eq!(img.get(0, 0), 0);
        assert_eq!(img.get(1, 0), 255);

        let mut binary = b"P5 2 1 255\n".to_vec();
        binary.extend_from_slice(&[7, 200]);
        let img = GrayImage::from_pgm(&binary).unwrap();
        assert_eq!(img.get(1, 0), 200);

        assert!(matches!(
            GrayImage::from_pgm(b"\x89PNG...."),
            Err(MediaError::Unsupported(_))
        ));
    }

    #[test]
    fn summary_mentions_text_elements_and_charts() {
        let el = VisualElement {
            kind: VisualElementKind::Graph,
            confidence: 0.7,
            bounding_box: BoundingBox {
                x: 0,
                y: 0,
                width: 10,
                height: 10,
            },
        };
        let s = summarize("Nezaměstnanost 15 %", &[el.clone(), el], &[ChartKind::PieChart]);
        assert_eq!(
            s,
            "Obrázek obsahuje malé množství textu (19 znaků). Obrázek obsahuje 2 grafů. Obrázek obsahuje koláčový graf."
        );
        assert_eq!(summarize("", &[], &[]), "Obrázek neobsahuje žádný čitelný text.");
    }

    #[test]
    fn resize_and_diff() {
        let a = GrayImage::filled(320, 180, 10).unwrap().resize_nearest(160, 90);
        let b = GrayImage::filled(160, 90, 50).unwrap();
        assert_eq!((a.width(), a.height()), (160, 90));
        assert_eq!(a.mean_abs_diff(&b), 40.0);
    }
}
