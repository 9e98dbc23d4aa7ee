//! SVG overlay of annotation markers.
//!
//! Points are drawn as circles and rectangles as translucent boxes, stroked
//! green for foreground prompts and red for background prompts.
//!
//! ```xml
//! <svg xmlns="http://www.w3.org/2000/svg" width="512" height="512">
//!   <circle cx="10" cy="12" r="2" stroke="green" stroke-width="1" fill="green"/>
//!   <rect x="4" y="4" width="20" height="8" stroke="red" stroke-width="1" fill="#ffffff55"/>
//! </svg>
//! ```

use quick_xml::se::to_string;
use serde::Serialize;

use crate::annotation::{Annotation, Marker, PromptLabel};
use crate::constants::overlay::{
    BACKGROUND_STROKE, FOREGROUND_STROKE, POINT_RADIUS, RECT_FILL, STROKE_WIDTH,
};
use crate::error::{Result, ViewerError};

const SVG_NAMESPACE: &str = "http://www.w3.org/2000/svg";

#[derive(Debug, Serialize)]
#[serde(rename = "svg")]
struct SvgDocument {
    #[serde(rename = "@xmlns")]
    xmlns: &'static str,
    #[serde(rename = "@width")]
    width: f64,
    #[serde(rename = "@height")]
    height: f64,
    #[serde(rename = "$value")]
    elements: Vec<SvgElement>,
}

#[derive(Debug, Serialize)]
enum SvgElement {
    #[serde(rename = "circle")]
    Circle {
        #[serde(rename = "@cx")]
        cx: f64,
        #[serde(rename = "@cy")]
        cy: f64,
        #[serde(rename = "@r")]
        r: f64,
        #[serde(rename = "@stroke")]
        stroke: &'static str,
        #[serde(rename = "@stroke-width")]
        stroke_width: f64,
        #[serde(rename = "@fill")]
        fill: &'static str,
    },
    #[serde(rename = "rect")]
    Rect {
        #[serde(rename = "@x")]
        x: f64,
        #[serde(rename = "@y")]
        y: f64,
        #[serde(rename = "@width")]
        width: f64,
        #[serde(rename = "@height")]
        height: f64,
        #[serde(rename = "@stroke")]
        stroke: &'static str,
        #[serde(rename = "@stroke-width")]
        stroke_width: f64,
        #[serde(rename = "@fill")]
        fill: &'static str,
    },
}

fn stroke_for(label: PromptLabel) -> &'static str {
    match label {
        PromptLabel::Foreground => FOREGROUND_STROKE,
        PromptLabel::Background => BACKGROUND_STROKE,
    }
}

impl From<&Annotation> for SvgElement {
    fn from(annotation: &Annotation) -> Self {
        let stroke = stroke_for(annotation.label);
        match annotation.marker {
            Marker::Circle { cx, cy } => SvgElement::Circle {
                cx,
                cy,
                r: POINT_RADIUS,
                stroke,
                stroke_width: STROKE_WIDTH,
                fill: stroke,
            },
            Marker::Rect {
                x,
                y,
                width,
                height,
            } => SvgElement::Rect {
                x,
                y,
                width,
                height,
                stroke,
                stroke_width: STROKE_WIDTH,
                fill: RECT_FILL,
            },
        }
    }
}

/// Serialize annotation markers to an SVG document sized to the canvas.
pub fn overlay_svg<'a>(
    annotations: impl IntoIterator<Item = &'a Annotation>,
    width: f64,
    height: f64,
) -> Result<String> {
    let document = SvgDocument {
        xmlns: SVG_NAMESPACE,
        width,
        height,
        elements: annotations.into_iter().map(SvgElement::from).collect(),
    };
    to_string(&document).map_err(|e| ViewerError::Xml(e.to_string()))
}
