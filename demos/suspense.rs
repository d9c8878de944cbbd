//! Suspense Example - context, state and an asynchronous value
//!
//! This example demonstrates:
//! - Publishing a value with a context provider
//! - A counter with local state driven by click events
//! - A suspense boundary showing a fallback until a deferred value settles
//!
//! Run with: cargo run --example suspense

use spark_dom::prelude::*;

fn theme_label(cx: &mut Scope<'_>, theme: &Context<&'static str>) -> Render {
    Ok(element("h1").child(format!("theme: {}", cx.use_context(theme))).into())
}

fn counter(cx: &mut Scope<'_>, _: &()) -> Render {
    let (count, set_count) = cx.use_state(|| 0)?;
    Ok(element("button")
        .attr("class", "counter")
        .on("click", move |_| set_count.update(|n| n + 1))
        .child(format!("clicked {count} times"))
        .into())
}

fn profile(cx: &mut Scope<'_>, user: &Deferred<String>) -> Render {
    let name = cx.use_deferred(user)?;
    Ok(element("p").child(format!("signed in as {name}")).into())
}

fn main() -> Result<(), RenderError> {
    spark_dom::logging::init(None);

    let mut doc = MemoryDocument::new();
    let target = doc.create_element("main");
    let renderer = Renderer::new(doc.clone());

    let theme = create_context("light");
    let (user, resolver) = Deferred::pending();

    let app = theme
        .provider("dark")
        .child(component(theme_label, theme.clone()))
        .child(component(counter, ()))
        .child(suspense(
            element("p").child("loading profile..."),
            component(profile, user),
        ));

    println!("=== spark-dom Suspense Example ===\n");

    renderer.render(app, target)?;
    println!("mounted:   {}", doc.inner_html(target));

    if let Some(button) = doc.query_selector(target, "button") {
        doc.click(button);
        doc.click(button);
    }
    renderer.run_microtasks()?;
    println!("clicked:   {}", doc.inner_html(target));

    resolver.resolve(String::from("ada"));
    renderer.run_microtasks()?;
    println!("settled:   {}", doc.inner_html(target));

    println!("\n{} document mutations issued", doc.mutations().len());
    Ok(())
}
