//! Descriptor builders - the authoring surface.
//!
//! This module provides the node descriptor model and its builders:
//! - [`element`] - Native element with attributes, listeners and children
//! - [`text`] - Text node
//! - [`fragment`] - Siblings without a wrapper
//! - [`component`] - Component invocation (function + inputs)
//! - [`suspense`] - Boundary with a fallback for pending children
//!
//! Providers are built from a [`Context`](crate::context::Context).
//!
//! # Example
//!
//! ```ignore
//! fn counter(cx: &mut Scope<'_>, label: &String) -> Render {
//!     let (count, set_count) = cx.use_state(|| 0)?;
//!     Ok(fragment([
//!         Node::from(element("p").child(format!("{label}: {count}"))),
//!         Node::from(
//!             element("button")
//!                 .on("click", move |_| set_count.set(count + 1))
//!                 .child("+"),
//!         ),
//!     ]))
//! }
//!
//! let app = component(counter, String::from("clicks"));
//! ```

mod types;

pub use types::*;

use std::any::Any;
use std::rc::Rc;

use crate::state::Scope;
use crate::types::ComponentId;

/// Native element descriptor for `tag`.
pub fn element(tag: impl Into<String>) -> Element {
    Element::new(tag)
}

/// Text node descriptor.
pub fn text(content: impl Into<String>) -> Node {
    Node::Text(content.into())
}

/// Fragment descriptor.
pub fn fragment(children: impl IntoIterator<Item = Node>) -> Node {
    Node::Fragment(children.into_iter().collect())
}

/// Component descriptor: `render` invoked with `props` on every render.
///
/// The identity of the component is the type of `render`, plus its address
/// when `render` is a plain `fn` pointer. The same function at the same
/// position keeps its instance (and its state) across re-renders, whatever
/// `props` it is given.
pub fn component<P, F>(render: F, props: P) -> ComponentNode
where
    P: 'static,
    F: Fn(&mut Scope<'_>, &P) -> Render + 'static,
{
    let id = match (&render as &dyn Any).downcast_ref::<ComponentFn<P>>() {
        Some(pointer) => ComponentId::of_pointer::<F>(*pointer as usize),
        None => ComponentId::of::<F>(),
    };
    ComponentNode {
        id,
        name: std::any::type_name::<F>(),
        key: None,
        render: erase(move |cx| render(cx, &props)),
    }
}

type ComponentFn<P> = fn(&mut Scope<'_>, &P) -> Render;

fn erase<F>(body: F) -> RenderFn
where
    F: Fn(&mut Scope<'_>) -> Render + 'static,
{
    Rc::new(body)
}

/// Suspense boundary: shows `fallback` while anything in `children` waits on
/// an unsettled deferred value.
pub fn suspense(fallback: impl Into<Node>, children: impl Into<Node>) -> Node {
    Node::Suspense(SuspenseNode {
        fallback: Box::new(fallback.into()),
        children: Box::new(children.into()),
    })
}
