use serde::Serialize;

use crate::languages::Language;
use crate::layout::Direction;
use crate::region::{BoxRect, Point};

pub const CROSS_ORIGIN: &str = "anonymous";

/// Render tree handed to the canvas editor. Array order is z-order, the
/// background image first.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Scene {
    pub width: u32,
    pub height: u32,
    pub background: String,
    pub objects: Vec<Layer>,
}

impl Scene {
    pub fn new(width: u32, height: u32, background: impl Into<String>) -> Self {
        Self {
            width,
            height,
            background: background.into(),
            objects: Vec::new(),
        }
    }

    pub fn push(&mut self, layer: Layer) {
        self.objects.push(layer);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Layer {
    Image(ImageLayer),
    Group(GroupLayer),
    Text(TextLayer),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    Left,
    Top,
    Center,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageLayer {
    pub name: String,
    pub left: i32,
    pub top: i32,
    pub width: u32,
    pub height: u32,
    pub origin_x: Origin,
    pub origin_y: Origin,
    pub src: String,
    pub cross_origin: String,
    pub selectable: bool,
    pub has_controls: bool,
    pub lock_movement_x: bool,
    pub lock_movement_y: bool,
    pub visible: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fill: Option<String>,
}

impl ImageLayer {
    pub fn new(
        name: impl Into<String>,
        left: i32,
        top: i32,
        width: u32,
        height: u32,
        src: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            left,
            top,
            width,
            height,
            origin_x: Origin::Left,
            origin_y: Origin::Top,
            src: src.into(),
            cross_origin: CROSS_ORIGIN.to_string(),
            selectable: true,
            has_controls: true,
            lock_movement_x: false,
            lock_movement_y: false,
            visible: true,
            fill: None,
        }
    }

    pub fn at_rect(name: impl Into<String>, rect: &BoxRect, src: impl Into<String>) -> Self {
        Self::new(name, rect.left as i32, rect.top as i32, rect.width(), rect.height(), src)
    }

    /// Pinned in place: not selectable, no handles, no movement.
    pub fn locked(mut self) -> Self {
        self.selectable = false;
        self.has_controls = false;
        self.lock_movement_x = true;
        self.lock_movement_y = true;
        self
    }

    pub fn with_fill(mut self, fill: impl Into<String>) -> Self {
        self.fill = Some(fill.into());
        self
    }

    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupLayer {
    pub name: String,
    pub left: i32,
    pub top: i32,
    pub width: u32,
    pub height: u32,
    pub has_controls: bool,
    pub lock_movement_x: bool,
    pub lock_movement_y: bool,
    pub objects: Vec<Layer>,
}

impl GroupLayer {
    /// A translation group covering `rect`. Children are re-anchored to the
    /// group center.
    pub fn for_region(rect: &BoxRect, children: Vec<Layer>) -> Self {
        let objects = children.into_iter().map(Layer::centered).collect();
        Self {
            name: "translation".to_string(),
            left: rect.left as i32,
            top: rect.top as i32,
            width: rect.width(),
            height: rect.height(),
            has_controls: false,
            lock_movement_x: true,
            lock_movement_y: true,
            objects,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TextExtra {
    pub from_lan: Language,
    pub to_lan: Language,
    pub from_text: String,
    pub to_text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TextLayer {
    pub text: String,
    pub left: i32,
    pub top: i32,
    pub width: u32,
    pub height: u32,
    pub origin_x: Origin,
    pub origin_y: Origin,
    pub font_family: String,
    pub font_size: u32,
    pub fill: String,
    pub angle: f32,
    pub direction: Direction,
    /// Absolute top-left the text was fitted at, before re-anchoring.
    pub placement: Point,
    pub overflow: bool,
    pub extra: TextExtra,
}

impl Layer {
    fn centered(self) -> Self {
        match self {
            Layer::Image(mut image) => {
                image.left = 0;
                image.top = 0;
                image.origin_x = Origin::Center;
                image.origin_y = Origin::Center;
                Layer::Image(image)
            }
            Layer::Text(mut text) => {
                text.left = 0;
                text.top = 0;
                text.origin_x = Origin::Center;
                text.origin_y = Origin::Center;
                Layer::Text(text)
            }
            group @ Layer::Group(_) => group,
        }
    }

    pub fn as_group(&self) -> Option<&GroupLayer> {
        match self {
            Layer::Group(group) => Some(group),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use insta::assert_snapshot;

    fn sample_scene() -> Scene {
        let rect = BoxRect {
            left: 4,
            top: 4,
            right: 116,
            bottom: 66,
        };
        let mut scene = Scene::new(400, 200, "#ddd");
        scene.push(Layer::Image(
            ImageLayer::new("bg", 0, 0, 400, 200, "/files/a.png")
                .locked()
                .with_fill("#ffffff"),
        ));
        let patch = ImageLayer::at_rect("bg0", &rect, "/files/a_bg0.png");
        let text = TextLayer {
            text: "SOLDE".to_string(),
            left: 20,
            top: 21,
            width: 83,
            height: 33,
            origin_x: Origin::Left,
            origin_y: Origin::Top,
            font_family: "AlibabaPuHuiTi".to_string(),
            font_size: 33,
            fill: "rgb(0, 0, 0)".to_string(),
            angle: 0.0,
            direction: Direction::Rtl,
            placement: Point::new(20, 21),
            overflow: false,
            extra: TextExtra {
                from_lan: Language::English,
                to_lan: Language::French,
                from_text: "SALE".to_string(),
                to_text: "SOLDE".to_string(),
            },
        };
        scene.push(Layer::Group(GroupLayer::for_region(
            &rect,
            vec![Layer::Image(patch), Layer::Text(text)],
        )));
        scene
    }

    #[test]
    fn group_children_are_centered_at_origin() {
        let scene = sample_scene();
        let group = scene.objects[1].as_group().unwrap();
        assert_eq!((group.left, group.top, group.width, group.height), (4, 4, 112, 62));
        for child in &group.objects {
            match child {
                Layer::Image(image) => {
                    assert_eq!((image.left, image.top, image.origin_x), (0, 0, Origin::Center))
                }
                Layer::Text(text) => {
                    assert_eq!((text.left, text.top, text.origin_y), (0, 0, Origin::Center))
                }
                Layer::Group(_) => panic!("nested group"),
            }
        }
    }

    #[test]
    fn scene_serialization_snapshot() {
        let json = serde_json::to_string_pretty(&sample_scene()).unwrap();
        assert_snapshot!(json, @r###"
        {
          "width": 400,
          "height": 200,
          "background": "#ddd",
          "objects": [
            {
              "type": "image",
              "name": "bg",
              "left": 0,
              "top": 0,
              "width": 400,
              "height": 200,
              "originX": "left",
              "originY": "top",
              "src": "/files/a.png",
              "crossOrigin": "anonymous",
              "selectable": false,
              "hasControls": false,
              "lockMovementX": true,
              "lockMovementY": true,
              "visible": true,
              "fill": "#ffffff"
            },
            {
              "type": "group",
              "name": "translation",
              "left": 4,
              "top": 4,
              "width": 112,
              "height": 62,
              "hasControls": false,
              "lockMovementX": true,
              "lockMovementY": true,
              "objects": [
                {
                  "type": "image",
                  "name": "bg0",
                  "left": 0,
                  "top": 0,
                  "width": 112,
                  "height": 62,
                  "originX": "center",
                  "originY": "center",
                  "src": "/files/a_bg0.png",
                  "crossOrigin": "anonymous",
                  "selectable": true,
                  "hasControls": true,
                  "lockMovementX": false,
                  "lockMovementY": false,
                  "visible": true
                },
                {
                  "type": "text",
                  "text": "SOLDE",
                  "left": 0,
                  "top": 0,
                  "width": 83,
                  "height": 33,
                  "originX": "center",
                  "originY": "center",
                  "fontFamily": "AlibabaPuHuiTi",
                  "fontSize": 33,
                  "fill": "rgb(0, 0, 0)",
                  "angle": 0.0,
                  "direction": "rtl",
                  "placement": {
                    "x": 20,
                    "y": 21
                  },
                  "overflow": false,
                  "extra": {
                    "from_lan": "en",
                    "to_lan": "fra",
                    "from_text": "SALE",
                    "to_text": "SOLDE"
                  }
                }
              ]
            }
          ]
        }
        "###);
    }
}
