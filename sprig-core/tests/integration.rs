//! Integration Tests
//!
//! End-to-end scenarios through the public API: apps mounted into the
//! thread-local document, driven by the manual ticker.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use sprig_core::reactive::stats;
use sprig_core::{
    batch, children, computed, create_app, create_portal, define_component, document, effect,
    error_boundary, h, props, AppOptions, Error, Event, EventMode, LifecycleEvent, PropValue,
    Resource, TickerKind,
};

fn options() -> AppOptions {
    AppOptions::default()
        .with_ticker(TickerKind::Manual)
        .with_dev_mode(true)
}

/// Counter: two writes in one batch cause a single re-render.
#[test]
fn counter_batches_writes_into_one_render() {
    let c = sprig_core::signal(0);
    let counter = define_component("Counter", move |_, _| Ok(h("span", vec![], children![c.get()])));

    let app = create_app(counter, options());
    let container = document().create_element("div");
    let handle = app.mount(&container).unwrap();
    assert_eq!(container.text_content(), "0");

    batch(|| {
        c.set(1);
        c.set(2);
    })
    .unwrap();
    assert_eq!(app.scheduler().pending(), 1);
    app.flush().unwrap();

    assert_eq!(container.text_content(), "2");
    assert_eq!(handle.component().unwrap().render_count(), 2);
}

/// Derived parity: an unchanged write reaches no observer.
#[test]
fn derived_parity() {
    let n = sprig_core::signal(3);
    let parity = computed(move || if n.get() % 2 == 0 { "even" } else { "odd" });
    assert_eq!(parity.get(), "odd");

    let runs = Rc::new(Cell::new(0));
    let r = runs.clone();
    let _watch = effect(move || {
        parity.get();
        r.set(r.get() + 1);
    });

    n.set(4);
    assert_eq!(parity.get(), "even");
    assert_eq!(runs.get(), 2);

    n.set(4);
    assert_eq!(runs.get(), 2);
}

/// Keyed list: reordering reuses every instance and unmounts nothing.
#[test]
fn keyed_list_reuses_instances() {
    let unmounts = Rc::new(Cell::new(0));
    let order = sprig_core::signal(vec!["a", "b", "c"]);

    let item = define_component("Item", |_, props| {
        let label = props.str("label").unwrap_or_default().to_string();
        Ok(h("li", vec![], children![label]))
    });
    let list = define_component("List", move |_, _| {
        let items = order
            .get()
            .into_iter()
            .map(|key| item.vnode(props! { "key" => key, "label" => key }, vec![]).into())
            .collect();
        Ok(h("ul", vec![], items))
    });

    let app = create_app(list, options());
    let u = unmounts.clone();
    app.on(LifecycleEvent::ComponentUnmounted, move |_| u.set(u.get() + 1));
    let container = document().create_element("div");
    let handle = app.mount(&container).unwrap();

    let root = handle.component().unwrap();
    let before: Vec<u64> = root.children().iter().map(|i| i.id()).collect();
    let ul = container.query_selector("ul").unwrap();
    let nodes_before = ul.children();

    order.set(vec!["c", "a", "b"]);
    app.flush().unwrap();

    let after: Vec<u64> = root.children().iter().map(|i| i.id()).collect();
    assert_eq!(after, vec![before[2], before[0], before[1]]);
    assert_eq!(ul.text_content(), "cab");
    assert_eq!(ul.children()[0], nodes_before[2]);
    assert_eq!(unmounts.get(), 0);
}

/// Unmount cleanup: the effect cleanup runs once and later writes touch
/// nothing.
#[test]
fn unmount_runs_cleanup_once() {
    let attached = Rc::new(Cell::new(0));
    let detached = Rc::new(Cell::new(0));
    let tick = sprig_core::signal(0);

    let (a, d) = (attached.clone(), detached.clone());
    let widget = define_component("Widget", move |cx, _| {
        let value = tick.get();
        let (a, d) = (a.clone(), d.clone());
        cx.use_effect(
            move || {
                a.set(a.get() + 1);
                move || d.set(d.get() + 1)
            },
            Some(()),
        )?;
        Ok(h(
            "div",
            props! { "onClick" => PropValue::handler(|_| ()) },
            children![value],
        ))
    });

    let app = create_app(widget, options());
    let container = document().create_element("div");
    let handle = app.mount(&container).unwrap();
    let instance = handle.component().unwrap();
    assert_eq!(attached.get(), 1);
    assert_eq!(instance.listener_count(), 1);

    let div = container.query_selector("div").unwrap();
    handle.unmount();
    assert_eq!(detached.get(), 1);
    assert_eq!(div.listener_count(), 0);
    assert_eq!(container.child_count(), 0);

    tick.set(1);
    assert_eq!(app.scheduler().pending(), 0);
    app.flush().unwrap();
    assert_eq!(detached.get(), 1);
    assert!(!instance.is_mounted());
}

/// Error boundary: the fallback replaces the broken subtree; reset either
/// re-catches or renders the healed child.
#[test]
fn error_boundary_fallback_and_reset() {
    let broken = Rc::new(Cell::new(true));
    let b = broken.clone();
    let child = define_component("Broken", move |_, _| {
        if b.get() {
            return Err(Error::render("cannot render"));
        }
        Ok(h("p", props! { "id" => "healed" }, children!["ok"]))
    });

    let handle_slot = Rc::new(RefCell::new(None));
    let hs = handle_slot.clone();
    let root = define_component("Root", move |_, _| {
        let hs = hs.clone();
        Ok(error_boundary(
            move |err, boundary| {
                *hs.borrow_mut() = Some(boundary.clone());
                h("em", props! { "id" => "fallback" }, children![err.to_string()])
            },
            children![child.vnode(vec![], vec![])],
        ))
    });

    let reported = Rc::new(RefCell::new(Vec::new()));
    let app = create_app(root, options());
    let r = reported.clone();
    app.on_error(move |err| r.borrow_mut().push(err.trace().to_vec()));

    let container = document().create_element("div");
    app.mount(&container).unwrap();
    assert!(container.query_selector("#fallback").is_some());
    assert!(container.query_selector("#healed").is_none());
    assert_eq!(
        reported.borrow()[0],
        vec!["Broken", "ErrorBoundary", "Root"]
    );

    let boundary = handle_slot.borrow().clone().unwrap();
    boundary.reset();
    app.flush().unwrap();
    assert!(container.query_selector("#fallback").is_some());
    assert_eq!(reported.borrow().len(), 2);

    broken.set(false);
    boundary.reset();
    app.flush().unwrap();
    assert!(container.query_selector("#fallback").is_none());
    assert_eq!(container.query_selector("#healed").unwrap().text_content(), "ok");
}

/// Portal: children live in the target, and unmounting the owner clears
/// them.
#[test]
fn portal_contents_follow_owner() {
    let target = document().create_element("aside");
    document().body().append_child(&target).unwrap();

    let t = target.clone();
    let dialog = define_component("Dialog", move |_, _| {
        Ok(h(
            "section",
            vec![],
            children![create_portal(children![h("p", vec![], children!["modal"])], t.clone())],
        ))
    });

    let app = create_app(dialog, options());
    let container = document().create_element("div");
    let handle = app.mount(&container).unwrap();
    assert_eq!(target.text_content(), "modal");
    assert_eq!(container.text_content(), "");

    handle.unmount();
    assert_eq!(target.child_count(), 0);
    target.remove();
}

/// Delegated mode: handlers are registered on the container only.
#[test]
fn delegated_events_reach_handlers() {
    let clicks = Rc::new(Cell::new(0));
    let c = clicks.clone();
    let button = define_component("Button", move |_, _| {
        let c = c.clone();
        Ok(h(
            "button",
            props! { "onClick" => PropValue::handler(move |_| c.set(c.get() + 1)) },
            children!["+"],
        ))
    });

    let app = create_app(button, options().with_event_mode(EventMode::Delegated));
    let container = document().create_element("div");
    let handle = app.mount(&container).unwrap();
    let node = container.query_selector("button").unwrap();
    assert_eq!(node.listener_count(), 0);
    assert_eq!(container.listener_count(), 1);

    node.dispatch_event(&Event::new("click"));
    assert_eq!(clicks.get(), 1);

    handle.unmount();
    assert_eq!(container.listener_count(), 0);
}

/// Suspense: pending resources show the fallback until they resolve.
#[test]
fn suspense_waits_for_resources() {
    let user: Resource<String> = Resource::new();
    let u = user.clone();
    let profile = define_component("Profile", move |_, _| {
        let name = u.read()?;
        Ok(h("b", vec![], children![name]))
    });
    let page = define_component("Page", move |_, _| {
        Ok(sprig_core::suspense(
            h("i", vec![], children!["loading"]),
            children![profile.vnode(vec![], vec![])],
        ))
    });

    let app = create_app(page, options());
    let container = document().create_element("div");
    app.mount(&container).unwrap();
    assert_eq!(container.text_content(), "loading");

    user.resolve(String::from("ada"));
    app.flush().unwrap();
    assert_eq!(container.text_content(), "ada");
}

/// Snapshots serialize the instance tree.
#[test]
fn snapshot_serializes() {
    let leaf = define_component("Leaf", |cx, _| {
        cx.use_state(0)?;
        Ok(h("i", vec![], vec![]))
    });
    let tree = define_component("Tree", move |_, _| Ok(h("div", vec![], children![leaf.vnode(vec![], vec![])])));

    let app = create_app(tree, options());
    app.mount(document().create_element("div")).unwrap();
    let json = serde_json::to_value(app.snapshot().unwrap()).unwrap();

    assert_eq!(json["name"], "Tree");
    assert_eq!(json["state"], "mounted");
    assert_eq!(json["children"][0]["name"], "Leaf");
    assert_eq!(json["children"][0]["hooks"], 1);
}

/// Graph stats stay bounded across mount and unmount.
#[test]
fn unmount_releases_effects() {
    let count = sprig_core::signal(1);
    let view = define_component("View", move |_, _| {
        Ok(h("p", props! { "title" => PropValue::signal(count) }, children![count]))
    });

    let baseline = stats().effect_count;
    let app = create_app(view, options());
    let handle = app.mount(document().create_element("div")).unwrap();
    assert!(stats().effect_count > baseline);

    handle.unmount();
    assert_eq!(stats().effect_count, baseline);
    assert_eq!(count.subscriber_count(), 0);
}

/// A failing scheduled update with no boundary above is reported once,
/// removes the instance output and fails the flush.
#[test]
fn update_error_without_boundary_fails_flush() {
    let fail = sprig_core::signal(false);
    let view = define_component("Flaky", move |_, _| {
        if fail.get() {
            return Err(Error::render("lost data"));
        }
        Ok(h("p", vec![], children!["fine"]))
    });

    let reported = Rc::new(RefCell::new(Vec::new()));
    let app = create_app(view, options());
    let r = reported.clone();
    app.on_error(move |err| r.borrow_mut().push(err.trace().to_vec()));

    let container = document().create_element("div");
    app.mount(&container).unwrap();
    assert!(container.query_selector("p").is_some());

    fail.set(true);
    assert!(app.flush().is_err());
    assert_eq!(*reported.borrow(), vec![vec![String::from("Flaky")]]);
    assert!(container.query_selector("p").is_none());
}

/// Keyed and unkeyed siblings reorder without recreating DOM nodes.
#[test]
fn mixed_keyed_and_unkeyed_reorder_keeps_nodes() {
    let flipped = sprig_core::signal(false);
    let list = define_component("Mixed", move |_, _| {
        let labels = if flipped.get() {
            ["b", "y", "a"]
        } else {
            ["a", "y", "b"]
        };
        let items = labels
            .into_iter()
            .map(|label| {
                if label == "y" {
                    h("li", vec![], children![label]).into()
                } else {
                    h("li", props! { "key" => label }, children![label]).into()
                }
            })
            .collect();
        Ok(h("ul", vec![], items))
    });

    let app = create_app(list, options());
    let container = document().create_element("div");
    app.mount(&container).unwrap();
    let ul = container.query_selector("ul").unwrap();
    let before = ul.children();
    assert_eq!(ul.text_content(), "ayb");

    flipped.set(true);
    app.flush().unwrap();

    let after = ul.children();
    assert_eq!(ul.text_content(), "bya");
    assert_eq!(after, vec![before[2].clone(), before[1].clone(), before[0].clone()]);
}

/// Passing the same signal again keeps the existing bindings: neither the
/// attribute nor the text node is written on re-render.
#[test]
fn same_signal_binding_survives_rerender() {
    let title = sprig_core::signal(String::from("draft"));
    let tick = sprig_core::signal(0);
    let card = define_component("Card", move |_, _| {
        tick.get();
        Ok(h(
            "p",
            props! { "title" => PropValue::signal(title) },
            children![title],
        ))
    });

    let app = create_app(card, options());
    let container = document().create_element("div");
    let handle = app.mount(&container).unwrap();
    let p = container.query_selector("p").unwrap();
    let text = p.first_child().unwrap();
    let (p_writes, text_writes) = (p.mutation_count(), text.mutation_count());
    let effects = stats().effect_count;

    tick.set(1);
    app.flush().unwrap();
    assert_eq!(handle.component().unwrap().render_count(), 2);
    assert_eq!(p.mutation_count(), p_writes);
    assert_eq!(text.mutation_count(), text_writes);
    assert_eq!(stats().effect_count, effects);
    assert_eq!(title.subscriber_count(), 2);

    title.set(String::from("final"));
    assert_eq!(p.get_attribute("title").as_deref(), Some("final"));
    assert_eq!(text.data(), "final");
}

/// New props from a re-rendering parent update the child inline without
/// queueing a second update for it.
#[test]
fn new_props_rerender_child_inline() {
    let label = sprig_core::signal("a");
    let child = define_component("Label", |_, props| {
        let text = props.str("text").unwrap_or_default().to_string();
        Ok(h("b", vec![], children![text]))
    });
    let parent = define_component("Parent", move |_, _| {
        Ok(h(
            "div",
            vec![],
            children![child.vnode(props! { "text" => label.get() }, vec![])],
        ))
    });

    let app = create_app(parent, options());
    let container = document().create_element("div");
    let handle = app.mount(&container).unwrap();

    label.set("b");
    assert_eq!(app.scheduler().pending(), 1);
    app.flush().unwrap();

    assert_eq!(container.text_content(), "b");
    assert_eq!(app.scheduler().pending(), 0);
    let child_instance = handle.component().unwrap().children()[0].clone();
    assert_eq!(child_instance.render_count(), 2);
}
