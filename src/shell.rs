//! Which screen to show for a request, and the navigation that goes with it.

use serde::{Deserialize, Serialize};

use crate::db::models::Role;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum AuthView {
    #[default]
    Landing,
    Login,
    Signup,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum Section {
    #[default]
    Home,
    Donor,
    Ngo,
    Admin,
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Screen {
    Landing,
    Login,
    Signup,
    DonorDashboard,
    NgoDashboard,
    AdminDashboard,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct NavItem {
    pub section: Section,
    pub label: &'static str,
}

/// The one dashboard section a role may open.
pub fn section_for(role: Role) -> Section {
    match role {
        Role::Donor => Section::Donor,
        Role::Ngo => Section::Ngo,
        Role::Admin => Section::Admin,
    }
}

fn dashboard_for(role: Role) -> Screen {
    match role {
        Role::Donor => Screen::DonorDashboard,
        Role::Ngo => Screen::NgoDashboard,
        Role::Admin => Screen::AdminDashboard,
    }
}

fn label_for(section: Section) -> &'static str {
    match section {
        Section::Home => "Home",
        Section::Donor => "My Donations",
        Section::Ngo => "Find Food",
        Section::Admin => "Admin Panel",
    }
}

pub fn resolve(role: Option<Role>, view: AuthView, section: Section) -> Screen {
    let Some(role) = role else {
        return match view {
            AuthView::Landing => Screen::Landing,
            AuthView::Login => Screen::Login,
            AuthView::Signup => Screen::Signup,
        };
    };
    if section != Section::Home && section == section_for(role) {
        dashboard_for(role)
    } else {
        Screen::Landing
    }
}

/// Home plus the role's own section; anonymous visitors get no navigation.
pub fn nav_items(role: Option<Role>) -> Vec<NavItem> {
    let Some(role) = role else {
        return Vec::new();
    };
    [Section::Home, section_for(role)]
        .into_iter()
        .map(|section| NavItem { section, label: label_for(section) })
        .collect()
}
