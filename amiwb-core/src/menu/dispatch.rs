//! The `(parent_index, item_index) -> Action` dispatch table (spec.md
//! SS4.F "Item activation"). Grounded on the teacher's `src/main.rs` big
//! subcommand `if let Some(...) = matches.subcommand_matches(...)` chain,
//! generalized from CLI subcommand dispatch to menu-item dispatch: same
//! flat-chain-of-matches shape, one distinct action per arm.

/// Which top-level system menu an item belongs to (spec.md SS4.F "Menu
/// mode: four system menus").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuLocation {
    Workbench,
    Window,
    Icons,
    Tools,
    Custom(usize),
}

/// Every effect a menu-item activation can have (spec.md SS4.F "Item
/// activation ... dispatch table whose effects include").
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    OpenExecuteDialog,
    OpenRequester,
    ToggleHiddenFiles,
    SetViewIcons,
    SetViewNames,
    IconifyActive,
    MaximizeActive,
    CycleWindows,
    CloseActive,
    NewDrawer,
    OpenParent,
    OpenSelectedIcon,
    CopySelected,
    RenameSelected,
    DeleteSelected,
    ShowInformation,
    IconCleanup,
    Suspend,
    Restart,
    Quit,
    /// Launches a user-configured tool: the shell command from
    /// `toolsdaemonrc` (spec.md SS4.F "launch configured tools").
    RunCommand(String),
    NoOp,
}

/// Resolves `(location, item_index)` to the [`Action`] it triggers (spec.md
/// SS4.F "dispatches by (parent_index, item_index) through a dispatch
/// table"). Custom menus carry their command directly on the item, so
/// `command` is threaded through for the `Custom` location.
pub fn dispatch(location: MenuLocation, item_index: usize, command: Option<&str>) -> Action {
    match location {
        MenuLocation::Workbench => match item_index {
            0 => Action::IconCleanup,
            1 => Action::OpenExecuteDialog,
            2 => Action::OpenRequester,
            3 => Action::Suspend,
            4 => Action::Restart,
            5 => Action::Quit,
            _ => Action::NoOp,
        },
        MenuLocation::Window => match item_index {
            0 => Action::NewDrawer,
            1 => Action::OpenParent,
            2 => Action::CloseActive,
            3 => Action::IconifyActive,
            4 => Action::MaximizeActive,
            5 => Action::CycleWindows,
            _ => Action::NoOp,
        },
        MenuLocation::Icons => match item_index {
            0 => Action::CopySelected,
            1 => Action::RenameSelected,
            2 => Action::ShowInformation,
            3 => Action::DeleteSelected,
            _ => Action::NoOp,
        },
        MenuLocation::Tools => match item_index {
            0 => Action::ToggleHiddenFiles,
            1 => Action::SetViewIcons,
            2 => Action::SetViewNames,
            _ => Action::NoOp,
        },
        MenuLocation::Custom(_) => command.map(|c| Action::RunCommand(c.to_string())).unwrap_or(Action::NoOp),
    }
}

/// Recomputes each system menu's per-item enabled state for the current
/// selection/active-canvas context (spec.md SS4.F "Enable/disable rules").
#[derive(Debug, Clone, Copy, Default)]
pub struct MenuContext {
    pub has_selection: bool,
    pub selection_is_system_icon: bool,
    pub at_filesystem_root: bool,
    pub active_is_desktop: bool,
}

/// `true` if the item at `(location, item_index)` should be enabled given
/// `ctx` (spec.md SS4.F "e.g. Delete is disabled unless a non-system icon
/// is selected; Open Parent is disabled at root; View-By is disabled on
/// the desktop").
pub fn is_enabled(location: MenuLocation, item_index: usize, ctx: MenuContext) -> bool {
    match (location, item_index) {
        (MenuLocation::Icons, 3) => ctx.has_selection && !ctx.selection_is_system_icon, // Delete
        (MenuLocation::Icons, 1) => ctx.has_selection && !ctx.selection_is_system_icon, // Rename
        (MenuLocation::Icons, 0) => ctx.has_selection,                                  // Copy
        (MenuLocation::Window, 1) => !ctx.at_filesystem_root,                            // Open Parent
        (MenuLocation::Tools, 1) | (MenuLocation::Tools, 2) => !ctx.active_is_desktop,    // View By *
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dispatches_known_workbench_items() {
        assert_eq!(dispatch(MenuLocation::Workbench, 1, None), Action::OpenExecuteDialog);
        assert_eq!(dispatch(MenuLocation::Workbench, 5, None), Action::Quit);
    }

    #[test]
    fn dispatches_window_maximize_and_cycle() {
        assert_eq!(dispatch(MenuLocation::Window, 4, None), Action::MaximizeActive);
        assert_eq!(dispatch(MenuLocation::Window, 5, None), Action::CycleWindows);
    }

    #[test]
    fn custom_menu_dispatches_its_command() {
        assert_eq!(dispatch(MenuLocation::Custom(0), 0, Some("xterm")), Action::RunCommand("xterm".into()));
        assert_eq!(dispatch(MenuLocation::Custom(0), 0, None), Action::NoOp);
    }

    #[test]
    fn delete_disabled_without_selection() {
        let ctx = MenuContext::default();
        assert!(!is_enabled(MenuLocation::Icons, 3, ctx));
    }

    #[test]
    fn delete_disabled_for_system_icons() {
        let ctx = MenuContext { has_selection: true, selection_is_system_icon: true, ..Default::default() };
        assert!(!is_enabled(MenuLocation::Icons, 3, ctx));
    }

    #[test]
    fn open_parent_disabled_at_root() {
        let ctx = MenuContext { at_filesystem_root: true, ..Default::default() };
        assert!(!is_enabled(MenuLocation::Window, 1, ctx));
    }

    #[test]
    fn view_by_disabled_on_desktop() {
        let ctx = MenuContext { active_is_desktop: true, ..Default::default() };
        assert!(!is_enabled(MenuLocation::Tools, 1, ctx));
    }
}
