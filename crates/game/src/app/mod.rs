mod autopilot;
mod bootstrap;
mod scenes;

use std::io::Write;
use std::path::PathBuf;

use scene_flow::{
    run_headless, FileStore, FrameClock, LoopConfig, ProgressSnapshot, ProgressStore,
    SceneContent, PROGRESS_STORAGE_KEY,
};
use serde::Deserialize;

use autopilot::DemoPilot;
use bootstrap::{build_app, build_machine, build_router};

pub(crate) use bootstrap::{init_tracing, AppError};

/// Shape of an `achievements.<key>` entry in the state bag.
#[derive(Debug, Deserialize)]
struct AchievementRecord {
    #[serde(default)]
    title: String,
    #[serde(default)]
    unlocked: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum CommandKind {
    Status,
    Reset,
    GoTo { key: String },
    Demo { max_ticks: Option<u64> },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct CliOptions {
    /// Project root; resolved from the environment when absent.
    pub(crate) root: Option<PathBuf>,
}

pub(crate) fn run<W: Write>(
    kind: CommandKind,
    options: CliOptions,
    stdout: &mut W,
) -> Result<(), AppError> {
    let app = build_app(options.root.as_deref())?;
    match kind {
        CommandKind::Status => {
            let store = FileStore::new(&app.paths.save_dir);
            match store.read(PROGRESS_STORAGE_KEY)? {
                Some(raw) => {
                    let snapshot = parse_snapshot(&raw)?;
                    write_status(stdout, &app.content, &snapshot)?;
                }
                None => writeln!(stdout, "no saved progress")?,
            }
        }
        CommandKind::Reset => {
            let mut router = build_router(&app);
            router.reset_state();
            writeln!(stdout, "progress reset")?;
        }
        CommandKind::GoTo { key } => {
            let mut router = build_router(&app);
            if router.go_to_scene_by_key(&key).is_none() {
                return Err(AppError::UnknownScene { key });
            }
            router.save_state()?;
            writeln!(
                stdout,
                "current scene: {key} ({}/{})",
                router.current_index() + 1,
                app.content.table.len()
            )?;
        }
        CommandKind::Demo { max_ticks } => {
            let config = LoopConfig {
                max_ticks,
                ..LoopConfig::default()
            };
            let mut machine = build_machine(&app)?;
            let mut pilot = DemoPilot::new(FrameClock::new(&config).fixed_dt());
            let summary = run_headless(&mut machine, &mut pilot, &config);
            writeln!(stdout, "visited: {}", summary.visited.join(" -> "))?;
            writeln!(stdout, "ticks: {}", summary.ticks)?;
            writeln!(stdout, "scene switches: {}", summary.scene_switches)?;
            match (&summary.final_scene, summary.finished) {
                (_, true) => writeln!(stdout, "finished: yes")?,
                (Some(scene), false) => writeln!(stdout, "stopped in: {scene}")?,
                (None, false) => writeln!(stdout, "stopped")?,
            }
        }
    }
    Ok(())
}

fn parse_snapshot(raw: &str) -> Result<ProgressSnapshot, AppError> {
    let deserializer = &mut serde_json::Deserializer::from_str(raw);
    serde_path_to_error::deserialize(deserializer).map_err(|error| AppError::SnapshotParse {
        path: error.path().to_string(),
        source: error.into_inner(),
    })
}

fn write_status<W: Write>(
    stdout: &mut W,
    content: &SceneContent,
    snapshot: &ProgressSnapshot,
) -> Result<(), AppError> {
    let table = &content.table;
    let scene = table
        .get(snapshot.current_scene_index)
        .map_or("<out of range>", |descriptor| descriptor.key.as_str());
    writeln!(
        stdout,
        "current scene: {scene} ({}/{})",
        snapshot.current_scene_index + 1,
        table.len()
    )?;
    writeln!(stdout, "saved at: {} ms", snapshot.timestamp)?;
    let table_state = match snapshot.table_fingerprint.as_deref() {
        Some(fingerprint) if fingerprint == table.fingerprint() => "current",
        Some(_) => "changed since save",
        None => "unknown",
    };
    writeln!(stdout, "scene table: {table_state}")?;

    let achievements: Vec<String> = snapshot
        .game_state
        .iter()
        .filter_map(|(key, value)| {
            let key = key.strip_prefix("achievements.")?;
            let record = AchievementRecord::deserialize(value).ok()?;
            match (record.unlocked, record.title.is_empty()) {
                (false, _) => None,
                (true, true) => Some(key.to_string()),
                (true, false) => Some(format!("{key} ({})", record.title)),
            }
        })
        .collect();
    if !achievements.is_empty() {
        writeln!(stdout, "achievements: {}", achievements.join(", "))?;
    }
    for (key, value) in &snapshot.game_state {
        writeln!(stdout, "  {key} = {value}")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::Path;

    use scene_flow::{ProgressStore, PROGRESS_STORAGE_KEY};

    use super::*;

    const SHIPPED_CONTENT: &str = include_str!("../../../../assets/base/scene_flow.xml");

    fn project_root() -> tempfile::TempDir {
        let temp = tempfile::tempdir().expect("tempdir");
        let content_dir = temp.path().join("assets").join("base");
        fs::create_dir_all(&content_dir).expect("content dir");
        fs::write(content_dir.join("scene_flow.xml"), SHIPPED_CONTENT).expect("content");
        temp
    }

    fn run_command(root: &Path, kind: CommandKind) -> Result<String, AppError> {
        let options = CliOptions {
            root: Some(root.to_path_buf()),
        };
        let mut out = Vec::new();
        run(kind, options, &mut out)?;
        Ok(String::from_utf8(out).expect("utf8"))
    }

    #[test]
    fn status_without_save_reports_fresh_start() {
        let root = project_root();
        let out = run_command(root.path(), CommandKind::Status).expect("status");
        assert_eq!(out, "no saved progress\n");
    }

    #[test]
    fn goto_saves_progress_that_status_reads_back() {
        let root = project_root();
        let out = run_command(
            root.path(),
            CommandKind::GoTo {
                key: "Combat".to_string(),
            },
        )
        .expect("goto");
        assert_eq!(out, "current scene: Combat (8/11)\n");

        let status = run_command(root.path(), CommandKind::Status).expect("status");
        assert!(status.starts_with("current scene: Combat (8/11)\n"));
        assert!(status.contains("scene table: current\n"));
    }

    #[test]
    fn reset_clears_saved_progress() {
        let root = project_root();
        run_command(
            root.path(),
            CommandKind::GoTo {
                key: "Runner".to_string(),
            },
        )
        .expect("goto");

        let out = run_command(root.path(), CommandKind::Reset).expect("reset");
        assert_eq!(out, "progress reset\n");
        let status = run_command(root.path(), CommandKind::Status).expect("status");
        assert_eq!(status, "no saved progress\n");
    }

    #[test]
    fn goto_unknown_scene_is_an_error() {
        let root = project_root();
        let error = run_command(
            root.path(),
            CommandKind::GoTo {
                key: "Nowhere".to_string(),
            },
        )
        .expect_err("unknown");
        assert!(matches!(error, AppError::UnknownScene { ref key } if key == "Nowhere"));
    }

    #[test]
    fn status_lists_achievements_from_saved_state() {
        let root = project_root();
        let mut store = FileStore::new(root.path().join("cache").join("saves"));
        store
            .write(
                PROGRESS_STORAGE_KEY,
                r#"{"currentSceneIndex":4,"gameState":{"achievements.Achievement1":{"title":"¡Logro Desbloqueado!","unlocked":true},"achievements.Achievement2":{"unlocked":false}},"timestamp":7}"#,
            )
            .expect("write");

        let status = run_command(root.path(), CommandKind::Status).expect("status");
        assert!(status.contains("current scene: Achievement1 (5/11)\n"));
        assert!(status.contains("saved at: 7 ms\n"));
        assert!(status.contains("scene table: unknown\n"));
        assert!(status.contains("achievements: Achievement1 (¡Logro Desbloqueado!)\n"));
    }

    #[test]
    fn status_reports_where_a_save_is_malformed() {
        let root = project_root();
        let mut store = FileStore::new(root.path().join("cache").join("saves"));
        store
            .write(PROGRESS_STORAGE_KEY, r#"{"currentSceneIndex":"three"}"#)
            .expect("write");

        let error = run_command(root.path(), CommandKind::Status).expect_err("malformed");
        match error {
            AppError::SnapshotParse { path, .. } => assert_eq!(path, "currentSceneIndex"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn startup_loads_sprites_next_to_the_content() {
        let root = project_root();
        let sprite_dir = root.path().join("assets").join("base").join("sprites");
        fs::create_dir_all(&sprite_dir).expect("sprite dir");
        image::RgbaImage::new(35, 80)
            .save(sprite_dir.join("player.png"))
            .expect("player png");

        let app = build_app(Some(root.path())).expect("app");
        assert_eq!(app.textures.dimensions("player"), Some((35, 80)));
        assert_eq!(app.textures.len(), 1);
    }

    #[test]
    fn demo_stops_at_tick_budget() {
        let root = project_root();
        let out = run_command(
            root.path(),
            CommandKind::Demo {
                max_ticks: Some(10),
            },
        )
        .expect("demo");
        assert!(out.starts_with("visited: MainMenu\n"));
        assert!(out.contains("ticks: 10\n"));
        assert!(out.contains("stopped in: MainMenu\n"));
    }

    fn visited_keys(out: &str) -> Vec<String> {
        out.lines()
            .find_map(|line| line.strip_prefix("visited: "))
            .expect("visited line")
            .split(" -> ")
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn demo_plays_the_shipped_flow_and_starts_over() {
        let root = project_root();
        let out = run_command(
            root.path(),
            CommandKind::Demo {
                max_ticks: Some(50_000),
            },
        )
        .expect("demo");
        assert!(out.contains("finished: yes\n"), "demo stalled:\n{out}");

        let visited = visited_keys(&out);
        let content = scene_flow::parse_scene_content_str(
            Path::new("scene_flow.xml"),
            SHIPPED_CONTENT,
        )
        .expect("content");
        for descriptor in content.table.descriptors() {
            assert!(
                visited.contains(&descriptor.key),
                "{} never visited: {visited:?}",
                descriptor.key
            );
        }
        let combat_visits = visited.iter().filter(|key| key.as_str() == "Combat").count();
        assert_eq!(combat_visits, 2);
        assert_eq!(
            &visited[visited.len() - 2..],
            ["EndGame".to_string(), "MainMenu".to_string()]
        );

        let status = run_command(root.path(), CommandKind::Status).expect("status");
        assert!(status.starts_with("current scene: MainMenu (1/11)\n"));
        assert!(!status.contains("achievements:"));

        let again = run_command(
            root.path(),
            CommandKind::Demo {
                max_ticks: Some(10),
            },
        )
        .expect("second demo");
        assert!(again.starts_with("visited: MainMenu\n"));
    }
}
