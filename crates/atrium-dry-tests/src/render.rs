// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Render port that records commits instead of drawing.

use atrium_app_core::render_port::{Region, RenderPort};
use std::cell::RefCell;
use std::rc::Rc;

#[derive(Debug)]
struct Inner<V> {
    commits: Vec<(Region, V)>,
    redraws: usize,
}

/// [`RenderPort`] that keeps every committed view. Clones share the log.
#[derive(Debug)]
pub struct RecordingRenderPort<V> {
    inner: Rc<RefCell<Inner<V>>>,
}

impl<V> Clone for RecordingRenderPort<V> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<V> Default for RecordingRenderPort<V> {
    fn default() -> Self {
        Self {
            inner: Rc::new(RefCell::new(Inner {
                commits: Vec::new(),
                redraws: 0,
            })),
        }
    }
}

impl<V: Clone> RecordingRenderPort<V> {
    /// Empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every `(region, view)` committed so far.
    pub fn commits(&self) -> Vec<(Region, V)> {
        self.inner.borrow().commits.clone()
    }

    /// Most recent view committed for `region`.
    pub fn last(&self, region: &Region) -> Option<V> {
        self.inner
            .borrow()
            .commits
            .iter()
            .rev()
            .find(|(r, _)| r == region)
            .map(|(_, v)| v.clone())
    }

    /// Number of completed render passes.
    pub fn redraws(&self) -> usize {
        self.inner.borrow().redraws
    }
}

impl<V: Clone> RenderPort<V> for RecordingRenderPort<V> {
    fn commit(&self, region: &Region, view: &V) {
        self.inner
            .borrow_mut()
            .commits
            .push((region.clone(), view.clone()));
    }

    fn request_redraw(&self) {
        self.inner.borrow_mut().redraws += 1;
    }
}
