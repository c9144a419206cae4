// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Port trait for UI/adapter layers to receive projected views without the
//! engine depending on a specific UI framework.

use std::borrow::Cow;
use std::fmt;

/// Named UI area that can be re-rendered independently.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Region {
    /// Top bar.
    Header,
    /// Navigation sidebar.
    Sidebar,
    /// Main page content.
    Page,
    /// Modal dialog.
    Modal,
    /// Detail side panel.
    SidePanel,
    /// Host-defined region.
    Named(Cow<'static, str>),
}

impl Region {
    /// Host-defined region by name.
    pub fn named(name: impl Into<Cow<'static, str>>) -> Self {
        Region::Named(name.into())
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Region::Header => f.write_str("header"),
            Region::Sidebar => f.write_str("sidebar"),
            Region::Page => f.write_str("page"),
            Region::Modal => f.write_str("modal"),
            Region::SidePanel => f.write_str("side-panel"),
            Region::Named(name) => f.write_str(name),
        }
    }
}

/// Commit step of a render pass; implementations apply an already-projected
/// view to the real surface and are expected to be cheap.
pub trait RenderPort<V> {
    /// Apply the view for one region.
    fn commit(&self, region: &Region, view: &V);

    /// Called once after all regions of a pass were committed.
    fn request_redraw(&self) {}
}
