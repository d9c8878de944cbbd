//! Context scenarios rendered into a `MemoryDocument`.

use spark_dom::prelude::*;
use spark_dom::renderer::Mutation;
use spark_dom::types::NodeRef;

fn setup() -> (MemoryDocument, NodeRef, Renderer) {
    spark_dom::logging::init_for_tests();
    let mut doc = MemoryDocument::new();
    let root = doc.create_element("div");
    let renderer = Renderer::new(doc.clone());
    (doc, root, renderer)
}

fn content(cx: &mut Scope<'_>, ctx: &Context<i32>) -> Render {
    let num = cx.use_context(ctx);
    Ok(element("p").child(num.to_string()).into())
}

#[test]
fn simple_context() {
    let (doc, root, renderer) = setup();
    let ctx = create_context(0);

    let app = component(
        |_cx: &mut Scope<'_>, ctx: &Context<i32>| {
            Ok(ctx.provider(1).child(component(content, ctx.clone())).into())
        },
        ctx,
    );
    renderer.render(app, root).unwrap();

    assert_eq!(doc.inner_html(root), "<p>1</p>");
}

#[test]
fn context_as_provider() {
    let (doc, root, renderer) = setup();
    let ctx = create_context(0);

    let app = component(
        |_cx: &mut Scope<'_>, ctx: &Context<i32>| {
            Ok(ctx.with(1, [Node::from(component(content, ctx.clone()))]))
        },
        ctx,
    );
    renderer.render(app, root).unwrap();

    assert_eq!(doc.inner_html(root), "<p>1</p>");
}

#[test]
fn default_value_without_provider() {
    let (doc, root, renderer) = setup();
    let ctx = create_context(7);

    renderer.render(component(content, ctx), root).unwrap();

    assert_eq!(doc.inner_html(root), "<p>7</p>");
}

fn counter(cx: &mut Scope<'_>, ctx: &Context<i32>) -> Render {
    let (count, set_count) = cx.use_state(|| 0)?;
    let num = cx.use_context(ctx);
    Ok(fragment([
        Node::from(element("p").child(format!("{num} - {count}"))),
        Node::from(
            element("button")
                .on("click", move |_| set_count.set(count + 1))
                .child("+"),
        ),
    ]))
}

#[test]
fn simple_context_with_state() {
    let (doc, root, renderer) = setup();
    let ctx = create_context(0);

    let app = component(
        |_cx: &mut Scope<'_>, ctx: &Context<i32>| {
            Ok(ctx.provider(1).child(component(counter, ctx.clone())).into())
        },
        ctx,
    );
    renderer.render(app, root).unwrap();
    assert_eq!(doc.inner_html(root), "<p>1 - 0</p><button>+</button>");

    doc.take_mutations();
    let button = doc.query_selector(root, "button").unwrap();
    doc.click(button);

    // Nothing is rendered until the microtask runs.
    assert_eq!(doc.inner_html(root), "<p>1 - 0</p><button>+</button>");
    assert!(renderer.has_pending_updates());

    renderer.run_microtasks().unwrap();
    assert_eq!(doc.inner_html(root), "<p>1 - 1</p><button>+</button>");

    let mutations = doc.take_mutations();
    assert_eq!(mutations.len(), 1);
    assert!(matches!(&mutations[0], Mutation::SetText { text, .. } if text == "1 - 1"));
}

#[test]
fn multiple_providers() {
    let (doc, root, renderer) = setup();
    let ctx = create_context(0);

    let app = component(
        |_cx: &mut Scope<'_>, ctx: &Context<i32>| {
            Ok(fragment([
                Node::from(ctx.provider(1).child(component(content, ctx.clone()))),
                Node::from(ctx.provider(2).child(component(content, ctx.clone()))),
            ]))
        },
        ctx,
    );
    renderer.render(app, root).unwrap();

    assert_eq!(doc.inner_html(root), "<p>1</p><p>2</p>");
}

#[test]
fn nested_providers() {
    let (doc, root, renderer) = setup();
    let ctx = create_context(0);

    let app = component(
        |_cx: &mut Scope<'_>, ctx: &Context<i32>| {
            Ok(ctx
                .provider(1)
                .child(component(content, ctx.clone()))
                .child(ctx.provider(3).child(component(content, ctx.clone())))
                .child(component(content, ctx.clone()))
                .into())
        },
        ctx,
    );
    renderer.render(app, root).unwrap();

    assert_eq!(doc.inner_html(root), "<p>1</p><p>3</p><p>1</p>");
}

#[test]
fn independent_contexts_do_not_interfere() {
    let (doc, root, renderer) = setup();
    let number = create_context(0);
    let label = create_context(String::from("none"));

    fn both(cx: &mut Scope<'_>, ctxs: &(Context<i32>, Context<String>)) -> Render {
        let number = cx.use_context(&ctxs.0);
        let label = cx.use_context(&ctxs.1);
        Ok(element("p").child(format!("{label}:{number}")).into())
    }

    let ctxs = (number.clone(), label.clone());
    let view = label.with(
        "outer".to_string(),
        [number.with(
            5,
            [
                Node::from(component(both, ctxs.clone())),
                label.with("inner".to_string(), [Node::from(component(both, ctxs.clone()))]),
            ],
        )],
    );
    renderer.render(view, root).unwrap();

    assert_eq!(doc.inner_html(root), "<p>outer:5</p><p>inner:5</p>");
}

#[test]
fn provider_value_change_updates_consumers() {
    let (doc, root, renderer) = setup();
    let ctx = create_context(0);

    fn app(cx: &mut Scope<'_>, ctx: &Context<i32>) -> Render {
        let (value, set_value) = cx.use_state(|| 1)?;
        Ok(fragment([
            Node::from(ctx.provider(value).child(component(content, ctx.clone()))),
            Node::from(element("button").on("click", move |_| set_value.update(|v| v + 1))),
        ]))
    }

    renderer.render(component(app, ctx), root).unwrap();
    assert_eq!(doc.inner_html(root), "<p>1</p><button></button>");

    let button = doc.query_selector(root, "button").unwrap();
    doc.click(button);
    renderer.run_microtasks().unwrap();

    assert_eq!(doc.inner_html(root), "<p>2</p><button></button>");
}

#[test]
fn update_restores_context_of_instance_position() {
    let (doc, root, renderer) = setup();
    let ctx = create_context(0);
    let handles = std::rc::Rc::new(std::cell::RefCell::new(Vec::new()));

    let recorder = {
        let handles = handles.clone();
        move |cx: &mut Scope<'_>, ctx: &Context<i32>| -> Render {
            handles.borrow_mut().push(cx.instance());
            let num = cx.use_context(ctx);
            Ok(element("p").child(num.to_string()).into())
        }
    };

    let view = fragment([
        ctx.with(1, [Node::from(component(recorder.clone(), ctx.clone()))]),
        ctx.with(2, [Node::from(component(recorder, ctx.clone()))]),
    ]);
    renderer.render(view, root).unwrap();
    assert_eq!(doc.inner_html(root), "<p>1</p><p>2</p>");

    // Re-running the first consumer alone must see its own provider, not the
    // one most recently visited.
    let first = handles.borrow()[0].clone();
    renderer.update(&first).unwrap();
    assert_eq!(doc.inner_html(root), "<p>1</p><p>2</p>");
}
