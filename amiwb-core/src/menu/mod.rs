//! The menu system (spec.md SS4.F): menubar, dropdowns, one level of nested
//! submenus, app-menu substitution, custom menus.

pub mod dispatch;

pub use dispatch::{Action, MenuLocation};

use crate::canvas::CanvasId;
use crate::config::CustomMenuItem;

/// Menubar display mode (spec.md SS4.F "Menubar").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenubarMode {
    Logo,
    Menu,
}

/// Index into [`MenuTree`]'s arena. Per spec.md SS9, cross-references
/// (`parent_menu`) are indices, never owned pointers.
pub type MenuId = usize;

/// Row height every dropdown/submenu lays its items out at, and the unit
/// `item = event.y / ITEM_HEIGHT` hit-testing divides by (ported from
/// `menus.c`'s `MENU_ITEM_HEIGHT`).
pub const ITEM_HEIGHT: i32 = 20;

/// Left margin of the first menubar label, and the per-item trailing gap
/// added to its width (ported from `menus.c`'s `x_pos = 10` and
/// `padding = 20` in `menu_handle_menubar_motion`).
pub const MENUBAR_START_X: i32 = 10;
const MENUBAR_ITEM_PADDING: i32 = 20;

/// Approximate on-screen width of a menubar label. The original measures
/// this with `XftTextExtentsUtf8` against the loaded font; this crate's
/// dispatcher has no font metrics available to it (font loading is an
/// external collaborator, spec.md SS1), so hit-testing uses a fixed
/// per-character estimate instead of true glyph widths.
pub fn approx_label_width(label: &str) -> i32 {
    label.chars().count() as i32 * 8 + MENUBAR_ITEM_PADDING
}

/// A single menu node: a top-level dropdown or a nested submenu (spec.md
/// SS3 "Menu"). The menubar itself is a permanent canvas tracked by the
/// dispatcher, not a node here.
#[derive(Debug, Clone)]
pub struct Menu {
    /// The menubar label this dropdown opens under ("Workbench", "Window",
    /// ... or a custom section name); empty for a nested submenu, which has
    /// no menubar presence of its own.
    pub title: String,
    pub items: Vec<String>,
    pub shortcuts: Vec<Option<String>>,
    pub enabled: Vec<bool>,
    pub checkmarks: Vec<bool>,
    /// Shell commands for user-defined custom menus; empty for system menus
    /// (spec.md SS3 "commands[] (only for user-defined custom menus)").
    pub commands: Vec<Option<String>>,
    pub selected_item: Option<usize>,
    pub parent_menu: Option<MenuId>,
    pub parent_index: Option<usize>,
    pub submenus: Vec<Option<MenuId>>,
    /// The popup canvas backing this menu, if open; absent for the menubar
    /// itself, which has its own permanent canvas tracked separately.
    pub canvas: Option<CanvasId>,
    /// Which dispatch-table location this dropdown's items resolve through
    /// (`None` for a nested submenu, which inherits its parent's location).
    pub location: Option<MenuLocation>,
}

impl Menu {
    fn new(items: Vec<String>) -> Self {
        let n = items.len();
        Self {
            title: String::new(),
            items,
            shortcuts: vec![None; n],
            enabled: vec![true; n],
            checkmarks: vec![false; n],
            commands: vec![None; n],
            selected_item: None,
            parent_menu: None,
            parent_index: None,
            submenus: vec![None; n],
            canvas: None,
            location: None,
        }
    }
}

/// Arena of every live [`Menu`] node: menubar, open dropdown, and at most
/// one nested submenu (spec.md SS3 invariant "Only one dropdown and
/// optionally one nested submenu are open at any time").
#[derive(Debug, Default)]
pub struct MenuTree {
    nodes: Vec<Option<Menu>>,
    pub mode: MenubarModeState,
}

#[derive(Debug, Default)]
pub struct MenubarModeState {
    pub mode: Option<MenubarMode>,
}

impl MenuTree {
    pub fn new() -> Self {
        Self { nodes: Vec::new(), mode: MenubarModeState { mode: Some(MenubarMode::Logo) } }
    }

    pub fn insert(&mut self, menu: Menu) -> MenuId {
        self.nodes.push(Some(menu));
        self.nodes.len() - 1
    }

    pub fn get(&self, id: MenuId) -> Option<&Menu> {
        self.nodes.get(id).and_then(|m| m.as_ref())
    }

    pub fn get_mut(&mut self, id: MenuId) -> Option<&mut Menu> {
        self.nodes.get_mut(id).and_then(|m| m.as_mut())
    }

    /// Opens `child` as the submenu of `parent`'s item `item_index`,
    /// closing any previously-open submenu first (spec.md SS3 invariant).
    pub fn open_submenu(&mut self, parent: MenuId, item_index: usize, child: Menu) -> Option<MenuId> {
        let mut child = child;
        child.parent_menu = Some(parent);
        child.parent_index = Some(item_index);
        let id = self.insert(child);
        if let Some(p) = self.get_mut(parent) {
            if let Some(slot) = p.submenus.get_mut(item_index) {
                *slot = Some(id);
            }
        }
        Some(id)
    }

    /// Closes `id` and, recursively, anything nested beneath it (spec.md
    /// SS3 "closing the dropdown closes the nested").
    pub fn close(&mut self, id: MenuId) {
        if let Some(menu) = self.nodes.get(id).and_then(|m| m.as_ref()).cloned() {
            for child in menu.submenus.iter().flatten() {
                self.close(*child);
            }
        }
        if let Some(slot) = self.nodes.get_mut(id) {
            *slot = None;
        }
    }

    pub fn remove(&mut self, id: MenuId) -> Option<Menu> {
        self.nodes.get_mut(id).and_then(|m| m.take())
    }

    /// Finds the menu whose popup canvas is `canvas`, if one is currently
    /// open (spec.md SS4.F "Item activation" needs to resolve a click back
    /// from the canvas the compositor delivered the event on).
    pub fn find_by_canvas(&self, canvas: CanvasId) -> Option<MenuId> {
        self.nodes.iter().enumerate().find_map(|(id, m)| {
            m.as_ref().filter(|m| m.canvas == Some(canvas)).map(|_| id)
        })
    }

    /// Every top-level dropdown (menubar label), in menubar display order
    /// (spec.md SS4.F "Menubar"). Top-level menus are exactly the ones with
    /// no parent; nothing in this crate removes or reorders them after
    /// startup, so insertion order doubles as menubar left-to-right order.
    pub fn top_level(&self) -> Vec<MenuId> {
        self.nodes.iter().enumerate().filter_map(|(id, m)| m.as_ref().filter(|m| m.parent_menu.is_none()).map(|_| id)).collect()
    }
}

/// Builds the four permanent system menus (spec.md SS4.F "Menu mode: four
/// system menus"), each tagged with the menubar label it opens under and
/// the dispatch-table location its items resolve through.
pub fn system_menus() -> [Menu; 4] {
    let mut workbench = Menu::new(vec!["Icon Cleanup".into(), "Execute".into(), "Requester".into(), "Suspend".into(), "Restart".into(), "Quit".into()]);
    workbench.title = "Workbench".into();
    workbench.location = Some(MenuLocation::Workbench);

    let mut window = Menu::new(vec!["New Drawer".into(), "Open Parent".into(), "Close".into(), "Iconify".into(), "Maximize".into(), "Cycle".into()]);
    window.title = "Window".into();
    window.location = Some(MenuLocation::Window);

    let mut icons = Menu::new(vec!["Copy".into(), "Rename".into(), "Information".into(), "Delete".into()]);
    icons.title = "Icons".into();
    icons.location = Some(MenuLocation::Icons);

    let mut tools = Menu::new(vec!["Show Hidden".into(), "View By Icons".into(), "View By Names".into()]);
    tools.title = "Tools".into();
    tools.location = Some(MenuLocation::Tools);

    [workbench, window, icons, tools]
}

/// Builds a user-defined custom menu from a `toolsdaemonrc` `[Section]`
/// (spec.md SS4.F "custom menus loaded from config"). `index` identifies
/// this menu among the user's custom menus for [`MenuLocation::Custom`];
/// it is independent of the node's [`MenuId`] in the tree.
pub fn custom_menu(index: usize, title: &str, entries: &[CustomMenuItem]) -> Menu {
    let mut menu = Menu::new(entries.iter().map(|e| e.label.clone()).collect());
    menu.commands = entries.iter().map(|e| Some(e.command.clone())).collect();
    menu.title = title.to_string();
    menu.location = Some(MenuLocation::Custom(index));
    menu
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closing_a_dropdown_closes_its_nested_submenu() {
        let mut tree = MenuTree::new();
        let dropdown = tree.insert(Menu::new(vec!["a".into(), "b".into()]));
        let sub = tree.open_submenu(dropdown, 1, Menu::new(vec!["x".into()])).unwrap();

        tree.close(dropdown);
        assert!(tree.get(dropdown).is_none());
        assert!(tree.get(sub).is_none());
    }

    #[test]
    fn system_menus_have_expected_top_level_counts() {
        let menus = system_menus();
        assert_eq!(menus.len(), 4);
        assert!(menus[0].items.contains(&"Execute".to_string()));
        assert_eq!(menus[0].location, Some(MenuLocation::Workbench));
        assert_eq!(menus[3].title, "Tools");
    }

    #[test]
    fn find_by_canvas_locates_an_open_dropdown() {
        let mut tree = MenuTree::new();
        let id = tree.insert(Menu::new(vec!["a".into()]));
        tree.get_mut(id).unwrap().canvas = Some(7);
        assert_eq!(tree.find_by_canvas(7), Some(id));
        assert_eq!(tree.find_by_canvas(8), None);
    }

    #[test]
    fn top_level_excludes_nested_submenus() {
        let mut tree = MenuTree::new();
        let dropdown = tree.insert(Menu::new(vec!["a".into()]));
        let sub = tree.open_submenu(dropdown, 0, Menu::new(vec!["x".into()])).unwrap();
        let top = tree.top_level();
        assert!(top.contains(&dropdown));
        assert!(!top.contains(&sub));
    }

    #[test]
    fn approx_label_width_grows_with_label_length() {
        assert!(approx_label_width("Tools") < approx_label_width("Workbench"));
    }
}
