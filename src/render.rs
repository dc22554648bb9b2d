//! シーンのSVG描画
//!
//! テーブル外形を黒線、参加者を緑、空席を黄の点で描く。座標は平行移動前の
//! シーン座標（フィート）をそのまま使い、y軸は上向きに反転する。

use std::fs;
use std::path::Path;

use crate::models::{Point2D, TableOutline};
use crate::scene::Scene;

const PIXELS_PER_FOOT: f64 = 20.0;
const MARGIN_FT: f64 = 2.0;
/// 軸ラベルとタイトル用の余白
const PADDING_PX: f64 = 60.0;
const MARKER_RADIUS_PX: f64 = 5.0;
const PERSON_COLOR: &str = "green";
const EMPTY_CHAIR_COLOR: &str = "yellow";

/// フィート座標からSVGのピクセル座標への変換
struct Viewport {
    min: Point2D,
    max: Point2D,
}

impl Viewport {
    fn width_px(&self) -> f64 {
        (self.max.x - self.min.x) * PIXELS_PER_FOOT + 2.0 * PADDING_PX
    }

    fn height_px(&self) -> f64 {
        (self.max.y - self.min.y) * PIXELS_PER_FOOT + 2.0 * PADDING_PX
    }

    fn to_px(&self, p: Point2D) -> (f64, f64) {
        (
            PADDING_PX + (p.x - self.min.x) * PIXELS_PER_FOOT,
            PADDING_PX + (self.max.y - p.y) * PIXELS_PER_FOOT,
        )
    }
}

/// 目盛り間隔（1, 2, 5, 10, 20, ... ft）
fn grid_step(span: f64) -> f64 {
    if !(span.is_finite() && span > 0.0) {
        return 1.0;
    }
    let mut scale = 1.0;
    loop {
        for base in [1.0, 2.0, 5.0] {
            let step = base * scale;
            if span / step <= 12.0 {
                return step;
            }
        }
        scale *= 10.0;
    }
}

/// シーンをSVG文字列へ描画
pub fn render_svg(scene: &Scene) -> String {
    let (min, max) = scene
        .bounds()
        .unwrap_or((Point2D::origin(), Point2D::new(1.0, 1.0)));
    let view = Viewport {
        min: Point2D::new(min.x - MARGIN_FT, min.y - MARGIN_FT),
        max: Point2D::new(max.x + MARGIN_FT, max.y + MARGIN_FT),
    };
    let (width, height) = (view.width_px(), view.height_px());

    let mut svg = String::new();
    svg.push_str(&format!(
        "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{:.0}\" height=\"{:.0}\" viewBox=\"0 0 {:.1} {:.1}\">\n",
        width, height, width, height
    ));
    svg.push_str("<rect width=\"100%\" height=\"100%\" fill=\"white\"/>\n");

    // 格子と目盛り
    let step = grid_step((view.max.x - view.min.x).max(view.max.y - view.min.y));
    let mut x = (view.min.x / step).ceil() * step;
    while x <= view.max.x {
        let (px, top) = view.to_px(Point2D::new(x, view.max.y));
        let (_, bottom) = view.to_px(Point2D::new(x, view.min.y));
        svg.push_str(&format!(
            "<line x1=\"{px:.2}\" y1=\"{top:.2}\" x2=\"{px:.2}\" y2=\"{bottom:.2}\" stroke=\"#bbb\" stroke-width=\"0.4\" stroke-dasharray=\"4 3\"/>\n"
        ));
        svg.push_str(&format!(
            "<text x=\"{px:.2}\" y=\"{:.2}\" font-size=\"10\" text-anchor=\"middle\">{}</text>\n",
            bottom + 14.0,
            x
        ));
        x += step;
    }
    let mut y = (view.min.y / step).ceil() * step;
    while y <= view.max.y {
        let (left, py) = view.to_px(Point2D::new(view.min.x, y));
        let (right, _) = view.to_px(Point2D::new(view.max.x, y));
        svg.push_str(&format!(
            "<line x1=\"{left:.2}\" y1=\"{py:.2}\" x2=\"{right:.2}\" y2=\"{py:.2}\" stroke=\"#bbb\" stroke-width=\"0.4\" stroke-dasharray=\"4 3\"/>\n"
        ));
        svg.push_str(&format!(
            "<text x=\"{:.2}\" y=\"{:.2}\" font-size=\"10\" text-anchor=\"end\">{}</text>\n",
            left - 6.0,
            py + 3.0,
            y
        ));
        y += step;
    }

    // 軸ラベルとタイトル
    svg.push_str(&format!(
        "<text x=\"{:.2}\" y=\"{:.2}\" font-size=\"12\" text-anchor=\"middle\">x (ft)</text>\n",
        width / 2.0,
        height - 12.0
    ));
    svg.push_str(&format!(
        "<text x=\"16\" y=\"{:.2}\" font-size=\"12\" text-anchor=\"middle\" transform=\"rotate(-90 16 {:.2})\">y (ft)</text>\n",
        height / 2.0,
        height / 2.0
    ));
    if !scene.title.is_empty() {
        svg.push_str(&format!(
            "<text x=\"{:.2}\" y=\"24\" font-size=\"14\" text-anchor=\"middle\">{}</text>\n",
            width / 2.0,
            escape(&scene.title)
        ));
    }

    for outline in &scene.outlines {
        svg.push_str(&outline_element(&view, outline));
    }
    for p in &scene.empty_chairs {
        svg.push_str(&marker(&view, *p, EMPTY_CHAIR_COLOR));
    }
    for p in &scene.seats {
        svg.push_str(&marker(&view, *p, PERSON_COLOR));
    }

    svg.push_str(&legend(width, !scene.empty_chairs.is_empty()));
    svg.push_str("</svg>\n");
    svg
}

/// SVGをファイルへ保存
pub fn write_svg(scene: &Scene, path: &Path) -> std::io::Result<()> {
    fs::write(path, render_svg(scene))
}

fn outline_element(view: &Viewport, outline: &TableOutline) -> String {
    match *outline {
        TableOutline::Circle { center, radius } => {
            let (cx, cy) = view.to_px(center);
            format!(
                "<circle cx=\"{cx:.2}\" cy=\"{cy:.2}\" r=\"{:.2}\" fill=\"none\" stroke=\"black\"/>\n",
                radius * PIXELS_PER_FOOT
            )
        }
        TableOutline::Rectangle { .. } => {
            let points: Vec<String> = outline
                .corners()
                .iter()
                .map(|c| {
                    let (x, y) = view.to_px(*c);
                    format!("{x:.2},{y:.2}")
                })
                .collect();
            format!(
                "<polygon points=\"{}\" fill=\"none\" stroke=\"black\"/>\n",
                points.join(" ")
            )
        }
    }
}

fn marker(view: &Viewport, p: Point2D, color: &str) -> String {
    let (cx, cy) = view.to_px(p);
    format!("<circle cx=\"{cx:.2}\" cy=\"{cy:.2}\" r=\"{MARKER_RADIUS_PX}\" fill=\"{color}\"/>\n")
}

fn legend(width: f64, with_empty_chairs: bool) -> String {
    let mut entries = Vec::new();
    if with_empty_chairs {
        entries.push((EMPTY_CHAIR_COLOR, "Empty Chair"));
    }
    entries.push((PERSON_COLOR, "Person"));

    let x = width - 110.0;
    let mut out = String::new();
    for (i, (color, label)) in entries.iter().enumerate() {
        let y = 40.0 + i as f64 * 16.0;
        out.push_str(&format!(
            "<rect x=\"{x:.2}\" y=\"{:.2}\" width=\"12\" height=\"10\" fill=\"{color}\"/>\n",
            y - 9.0
        ));
        out.push_str(&format!(
            "<text x=\"{:.2}\" y=\"{y:.2}\" font-size=\"11\">{label}</text>\n",
            x + 18.0
        ));
    }
    out
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
