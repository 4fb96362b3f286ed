//! `amiwb` is an X11 window manager and desktop environment that reproduces
//! the look and interaction model of the Amiga Workbench. This binary is a
//! thin wrapper: parse the handful of ambient CLI flags (no subcommands are
//! defined, per spec.md SS6), initialize logging, connect to the X server,
//! bootstrap every subsystem, and run the single-threaded event loop.
//!
//! ## Command line
//!
//! ```bash
//! amiwb              # run normally
//! amiwb --debug      # run with debug-level logging
//! amiwb --quiet      # suppress all logging
//! amiwb version      # print version information
//! ```

use std::process::ExitCode;

use clap::{App, Arg, SubCommand};
use gory::*;
use tracing::{error, info, warn, Level};
use x11rb::connection::Connection;
use x11rb::protocol::xproto::{ChangeWindowAttributesAux, ConnectionExt};

use amiwb_core::canvas::{CanvasKind, CanvasStore, Rect};
use amiwb_core::compositor::Compositor;
use amiwb_core::config::{Config, CustomMenus};
use amiwb_core::diskdrives::DriveMonitor;
use amiwb_core::events::Engine;
use amiwb_core::intuition::{self, Intuition};
use amiwb_core::menu::{self, MenuTree};
use amiwb_core::process::ProcessTable;
use amiwb_core::Atoms;

const APP_NAME: &str = "amiwb";
const APP_VERSION: &str = env!("CARGO_PKG_VERSION");
const APP_DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");
const APP_GIT_COMMIT: &str = env!("APP_GIT_COMMIT");
const APP_BUILD_DATE: &str = env!("APP_BUILD_DATE");

fn main() -> ExitCode {
    let matches = App::new(format!("{}", APP_NAME.cyan()))
        .version(&format!("v{}", APP_VERSION)[..])
        .about(&format!("{}", APP_DESCRIPTION.green())[..])
        .arg(Arg::with_name("debug").short("d").long("debug").takes_value(false).help("Enable debug logging"))
        .arg(Arg::with_name("quiet").short("q").long("quiet").takes_value(false).help("Disable all logging"))
        .arg(
            Arg::with_name("loglevel")
                .long("log-level")
                .value_name("NAME")
                .takes_value(true)
                .help("Sets the log level [error|warn|info|debug|trace] [default: info]"),
        )
        .subcommand(SubCommand::with_name("version").alias("v").alias("ver").about("Print version information"))
        .get_matches();

    if matches.subcommand_matches("version").is_some() {
        println!("{}: {}", APP_NAME.cyan(), APP_DESCRIPTION.cyan());
        println!("{}", "--------------------------------------------------------".cyan());
        println!("{:<w$} {}", "Version:", APP_VERSION, w = 18);
        println!("{:<w$} {}", "Build Date:", APP_BUILD_DATE, w = 18);
        println!("{:<w$} {}", "Git Commit:", APP_GIT_COMMIT, w = 18);
        return ExitCode::SUCCESS;
    }

    let level = if matches.is_present("quiet") {
        None
    } else if matches.is_present("debug") {
        Some(Level::DEBUG)
    } else {
        matches.value_of("loglevel").and_then(|v| v.parse().ok())
    };
    let config = Config::load();
    if !matches.is_present("quiet") {
        amiwb_core::logging::init(level, config.log_cap_bytes);
    }

    match run(config) {
        Ok(()) => {
            info!("amiwb: normal shutdown");
            ExitCode::SUCCESS
        },
        Err(err) => {
            error!("amiwb: fatal: {}", err);
            ExitCode::from(1)
        },
    }
}

/// Connects to the X server, bootstraps every subsystem in dependency
/// order, and runs the event loop until [`Engine::quit`] is called. Exit
/// codes per spec.md SS6: any failure here (cannot open display, missing
/// required extension) is reported as exit code 1 (spec.md SS7 "Fatal init
/// failure ... Log and exit(1)").
fn run(config: Config) -> amiwb_core::Result<()> {
    let (conn, screen_num) = x11rb::connect(None)?;
    let screen = conn.setup().roots[screen_num].clone();
    let root = screen.root;
    let screen_w = screen.width_in_pixels as u32;
    let screen_h = screen.height_in_pixels as u32;

    let atoms = Atoms::new(&conn)?.reply()?;
    Intuition::advertise_ewmh(&conn, root, &atoms)?;
    if let Err(err) = Intuition::subscribe_randr(&conn, root) {
        warn!("amiwb: RandR unavailable, screen-resize events will be missed: {}", err);
    }

    conn.change_window_attributes(root, &ChangeWindowAttributesAux::new().event_mask(intuition::root_event_mask()))?.check()?;

    let mut store = CanvasStore::new();

    // Desktop: permanent, lives at the root position, no frame gadgets
    // (spec.md SS3 invariant "A Desktop canvas exists for the entire
    // session").
    let desktop = Intuition::create_native_frame(&conn, &mut store, CanvasKind::Desktop, root, Rect::new(0, 0, screen_w, screen_h), true)?;

    // Menubar: permanent single-row canvas across the top (spec.md SS4.F
    // "Menubar"). 20 px tall to match the top border height used elsewhere.
    let menubar = Intuition::create_native_frame(&conn, &mut store, CanvasKind::Menu, root, Rect::new(0, 0, screen_w, 20), true)?;

    let mut compositor = Compositor::bootstrap(&conn, screen_num, root, screen_w, screen_h, config.fps, config.render_mode)?;

    // Both permanent canvases need a compositor-side backing picture just
    // like any reparented window, or `render_frame` silently skips them
    // (spec.md SS3 invariant "A Desktop canvas exists for the entire
    // session").
    if let Some(canvas) = store.get_mut(desktop) {
        compositor.setup_canvas(&conn, canvas, screen.root_depth)?;
    }
    if let Some(canvas) = store.get_mut(menubar) {
        compositor.setup_canvas(&conn, canvas, screen.root_depth)?;
    }

    // Reparent every pre-existing top-level window (spec.md SS4.D
    // "Bootstrapping ... scan existing top-level children and reparent").
    let existing = Intuition::scan_existing(&conn, root)?;
    let workarea = store.get(desktop).map(|c| c.geometry).unwrap_or_default();
    for (win, attrs) in existing {
        let Ok(geom) = conn.get_geometry(win)?.reply() else { continue };
        match Intuition::reparent(&conn, &mut store, &atoms, win, geom.x as i32, geom.y as i32, geom.width as u32, geom.height as u32, workarea) {
            Ok(id) => {
                if let Some(canvas) = store.get_mut(id) {
                    if let Err(err) = compositor.setup_canvas(&conn, canvas, attrs.depth) {
                        warn!("amiwb: compositor setup failed for pre-existing window {}: {}", win, err);
                    }
                }
            },
            Err(err) => warn!("amiwb: failed to reparent pre-existing window {}: {}", win, err),
        }
    }

    let mut menus = MenuTree::new();
    let system = menu::system_menus();
    for m in system {
        menus.insert(m);
    }
    let custom = CustomMenus::load();
    for (index, (title, entries)) in custom.menus.iter().enumerate() {
        menus.insert(menu::custom_menu(index, title, entries));
    }

    let drives = match DriveMonitor::new() {
        Ok(monitor) => Some(monitor),
        Err(err) => {
            warn!("amiwb: disk drive monitor unavailable: {}", err);
            None
        },
    };

    let mut engine = Engine::new(conn, screen_num, root, atoms, config, store, compositor, Intuition::new(), menus, ProcessTable::new(), drives, menubar);

    engine.intuition.set_active(&engine.conn, &mut engine.store, desktop).ok();
    engine.run()
}
