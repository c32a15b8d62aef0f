//! Replays a JSON input script against a file-backed map viewport.
//!
//! ```text
//! basemap-demo script.json --name notes --data-dir ./state
//! ```
//!
//! State persists between runs, so replaying `[{"op": "undo"}]` afterwards
//! steps back through the history the previous run saved.

use basemap_core::storage::{FileObjectStore, FileScalarStore};
use basemap_core::{
    Camera, ConfigError, HistoryError, HistoryIndex, InputTarget, KeyInput, Modifiers, MouseInput,
    StorageError, TouchInput, TrackedElement, Viewport, ViewportConfig, ViewportHooks, WheelInput,
};
use clap::Parser;
use kurbo::{Point, Size};
use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
enum DemoError {
    #[error("failed to read script {path}: {source}")]
    ReadScript {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid script: {0}")]
    Script(#[from] serde_json::Error),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    History(#[from] HistoryError),
}

#[derive(Parser, Debug)]
#[command(name = "basemap-demo", about = "Replay scripted input against a persisted map")]
struct Cli {
    /// JSON array of operations to replay.
    script: PathBuf,

    /// Map instance name; namespaces all persisted state.
    #[arg(long, default_value = "demo")]
    name: String,

    /// Directory for persisted state. Defaults to the platform data directory.
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Viewport config JSON file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Answer yes when a `reset` operation asks for confirmation.
    #[arg(long)]
    allow_reset: bool,
}

/// One scripted operation. Positions are global (screen) coordinates
/// except for `create` and `marker`, which take local coordinates.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum Op {
    MouseDown { x: f64, y: f64 },
    MouseMove { x: f64, y: f64 },
    MouseUp { x: f64, y: f64 },
    MouseLeave,
    Wheel { x: f64, y: f64, delta_y: f64 },
    TouchStart { touches: Vec<[f64; 2]> },
    TouchMove { touches: Vec<[f64; 2]> },
    TouchEnd {
        #[serde(default)]
        touches: Vec<[f64; 2]>,
    },
    Key {
        key: String,
        #[serde(default)]
        ctrl: bool,
    },
    Create {
        #[serde(default = "default_tag")]
        tag: String,
        x: f64,
        y: f64,
        w: f64,
        h: f64,
        #[serde(default)]
        classname: String,
        #[serde(default = "default_saveable")]
        saveable: bool,
    },
    Marker { name: String, x: f64, y: f64 },
    Save,
    Undo,
    Redo,
    Reset,
}

fn default_tag() -> String {
    "div".to_string()
}

fn default_saveable() -> bool {
    true
}

fn touches(points: &[[f64; 2]]) -> TouchInput {
    TouchInput::on_surface(points.iter().map(|[x, y]| Point::new(*x, *y)).collect())
}

/// Logs every notification the viewport raises.
struct DemoHooks {
    allow_reset: bool,
    clicks: usize,
}

impl ViewportHooks for DemoHooks {
    fn on_click(&mut self, local: Point) {
        self.clicks += 1;
        log::info!("Click at ({:.1}, {:.1})", local.x, local.y);
    }

    fn on_drag_threshold_start(&mut self) {
        log::info!("Drag started");
    }

    fn on_drag_threshold_stop(&mut self) {
        log::info!("Drag stopped");
    }

    fn on_camera_changed(&mut self, camera: &Camera) {
        log::debug!("Camera at {:?}, scale {:.3}", camera.offset, camera.scale);
    }

    fn on_element_create(&mut self, element: &TrackedElement) {
        log::info!("Created {} '{}' at {:?}", element.tag, element.classification, element.position);
    }

    fn on_element_delete(&mut self, element: &TrackedElement) {
        log::debug!("Deleted {} '{}'", element.tag, element.classification);
    }

    fn on_initialized(&mut self) {
        log::info!("History store ready");
    }

    fn on_history_changed(&mut self, index: HistoryIndex) {
        log::debug!(
            "History {}..{} at {} (undo: {}, redo: {})",
            index.min,
            index.max,
            index.cur,
            index.can_undo(),
            index.can_redo()
        );
    }

    fn on_save_failed(&mut self, error: &HistoryError) {
        log::error!("Unable to save: {}", error);
    }

    fn confirm_reset(&mut self) -> bool {
        self.allow_reset
    }
}

type DemoViewport = Viewport<DemoHooks, FileScalarStore>;

async fn apply(viewport: &mut DemoViewport, op: Op) -> Result<(), DemoError> {
    match op {
        Op::MouseDown { x, y } => viewport.mouse_down(MouseInput::on_surface(Point::new(x, y))),
        Op::MouseMove { x, y } => viewport.mouse_move(MouseInput::on_surface(Point::new(x, y))),
        Op::MouseUp { x, y } => viewport.mouse_up(MouseInput::on_surface(Point::new(x, y))),
        Op::MouseLeave => viewport.mouse_leave(),
        Op::Wheel { x, y, delta_y } => {
            viewport.wheel(WheelInput {
                position: Point::new(x, y),
                delta_y,
                target: InputTarget::Surface,
                target_scrollable: false,
            });
        }
        Op::TouchStart { touches: points } => viewport.touch_start(&touches(&points)),
        Op::TouchMove { touches: points } => viewport.touch_move(&touches(&points)),
        Op::TouchEnd { touches: points } => viewport.touch_end(&touches(&points)),
        Op::Key { key, ctrl } => {
            let input = KeyInput {
                key,
                modifiers: Modifiers {
                    ctrl,
                    ..Modifiers::default()
                },
            };
            if let Some(command) = viewport.key_down(&input).history {
                viewport.apply(command).await?;
            }
        }
        Op::Create {
            tag,
            x,
            y,
            w,
            h,
            classname,
            saveable,
        } => {
            viewport.create_element(&tag, Point::new(x, y), Size::new(w, h), &classname, saveable);
        }
        Op::Marker { name, x, y } => {
            viewport.debug_marker(&name, Point::new(x, y));
        }
        Op::Save => {
            viewport.save().await?;
        }
        Op::Undo => viewport.undo().await?,
        Op::Redo => viewport.redo().await?,
        Op::Reset => {
            if !viewport.reset().await? {
                log::warn!("Reset skipped; pass --allow-reset to confirm");
            }
        }
    }
    Ok(())
}

fn parse_script(json: &str) -> Result<Vec<Op>, DemoError> {
    Ok(serde_json::from_str(json)?)
}

fn run(cli: Cli) -> Result<(), DemoError> {
    let config = match &cli.config {
        Some(path) => ViewportConfig::load(path)?,
        None => ViewportConfig::default(),
    };
    let json = std::fs::read_to_string(&cli.script).map_err(|source| DemoError::ReadScript {
        path: cli.script.clone(),
        source,
    })?;
    let script = parse_script(&json)?;

    let (objects, scalars) = match &cli.data_dir {
        Some(dir) => (
            FileObjectStore::new(dir.join("map")),
            FileScalarStore::open(dir.join("session.json"))?,
        ),
        None => (
            FileObjectStore::default_location(&cli.name)?,
            FileScalarStore::default_location(&cli.name)?,
        ),
    };
    log::info!("Persisting map '{}' under {}", cli.name, objects.base_path().display());

    let hooks = DemoHooks {
        allow_reset: cli.allow_reset,
        clicks: 0,
    };
    let mut viewport = Viewport::new(cli.name, config, scalars, hooks);

    pollster::block_on(async {
        viewport.attach_store(Box::new(objects)).await?;
        viewport.load(None).await?;
        for op in script {
            apply(&mut viewport, op).await?;
        }
        Ok::<_, DemoError>(())
    })?;

    let camera = viewport.camera();
    let index = viewport.history_index();
    println!("camera:   offset=({:.4}, {:.4}) scale={:.4}", camera.offset.x, camera.offset.y, camera.scale);
    println!("center:   {:?}", viewport.center_coords());
    println!("in map:   {}", viewport.is_within_map(viewport.center_coords()));
    println!("history:  min={} cur={} max={}", index.min, index.cur, index.max);
    println!("elements: {}", viewport.elements().count());
    println!("clicks:   {}", viewport.hooks().clicks);
    Ok(())
}

fn main() {
    env_logger::init();

    if let Err(e) = run(Cli::parse()) {
        log::error!("{}", e);
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_script() {
        let script = parse_script(
            r#"[
                {"op": "mouse_down", "x": 1, "y": 2},
                {"op": "key", "key": "z", "ctrl": true},
                {"op": "create", "x": 0, "y": 0, "w": 10, "h": 5},
                {"op": "touch_end"},
                {"op": "save"}
            ]"#,
        )
        .unwrap();

        assert_eq!(script[0], Op::MouseDown { x: 1.0, y: 2.0 });
        assert_eq!(
            script[1],
            Op::Key {
                key: "z".to_string(),
                ctrl: true
            }
        );
        assert_eq!(
            script[2],
            Op::Create {
                tag: "div".to_string(),
                x: 0.0,
                y: 0.0,
                w: 10.0,
                h: 5.0,
                classname: String::new(),
                saveable: true,
            }
        );
        assert_eq!(script[3], Op::TouchEnd { touches: Vec::new() });
        assert_eq!(script[4], Op::Save);
    }

    #[test]
    fn test_unknown_op_is_rejected() {
        assert!(matches!(parse_script(r#"[{"op": "fly"}]"#), Err(DemoError::Script(_))));
    }

    #[test]
    fn test_replay_persists_between_runs() {
        let dir = tempfile::tempdir().unwrap();
        let open = || {
            let scalars = FileScalarStore::open(dir.path().join("session.json")).unwrap();
            let hooks = DemoHooks {
                allow_reset: false,
                clicks: 0,
            };
            let mut viewport = Viewport::new("t", ViewportConfig::default(), scalars, hooks);
            let objects = FileObjectStore::new(dir.path().join("map"));
            pollster::block_on(viewport.attach_store(Box::new(objects))).unwrap();
            viewport
        };

        let mut viewport = open();
        let script = parse_script(
            r#"[
                {"op": "save"},
                {"op": "create", "x": 5, "y": 5, "w": 10, "h": 10, "classname": "note"},
                {"op": "save"},
                {"op": "mouse_down", "x": 10, "y": 10},
                {"op": "mouse_up", "x": 10, "y": 10}
            ]"#,
        )
        .unwrap();
        pollster::block_on(async {
            for op in script {
                apply(&mut viewport, op).await.unwrap();
            }
        });
        assert_eq!(viewport.hooks().clicks, 1);
        drop(viewport);

        let mut viewport = open();
        pollster::block_on(viewport.load(None)).unwrap();
        assert_eq!(viewport.history_index(), HistoryIndex { min: 1, cur: 2, max: 2 });
        assert_eq!(viewport.elements().count(), 1);

        pollster::block_on(apply(&mut viewport, Op::Undo)).unwrap();
        assert_eq!(viewport.elements().count(), 0);
    }
}
