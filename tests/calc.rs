//! A calculator visualization: shows the max, min or average of one measure,
//! centered in the view.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use futures::executor::block_on;
use serde_json::{Value, json};
use vizor::prelude::*;

const FONT_SIZE: f64 = 42.0;
const CHAR_WIDTH: f64 = 10.0;

#[derive(Debug, Default)]
struct SpanState {
    text: String,
    left: f64,
    top: f64,
}

/// A stand-in for a `<span>` element; equality is identity.
#[derive(Debug, Clone, Default)]
struct Span(Rc<RefCell<SpanState>>);

impl PartialEq for Span {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl Span {
    fn text(&self) -> String {
        self.0.borrow().text.clone()
    }

    fn position(&self) -> (f64, f64) {
        let state = self.0.borrow();
        (state.left, state.top)
    }
}

type CalcView = View<VisualModel, Span>;

fn calculate(model: &VisualModel) -> Option<f64> {
    let rows = model.data()?.as_array()?.clone();
    let measure = model.get("measure")?.as_str()?.to_string();
    let values = rows
        .iter()
        .map(|row| row.get(&measure).and_then(Value::as_f64));

    match model.get("operation").as_ref().and_then(Value::as_str)? {
        "max" => values.flatten().reduce(f64::max),
        "min" => values.flatten().reduce(f64::min),
        "avg" if rows.is_empty() => Some(0.0),
        #[allow(clippy::cast_precision_loss)]
        "avg" => Some(values.flatten().sum::<f64>() / rows.len() as f64),
        _ => None,
    }
}

#[allow(clippy::cast_precision_loss)]
fn center(model: &VisualModel, span: &Span) {
    let width = model.width().unwrap_or_default();
    let height = model.height().unwrap_or_default();
    let mut state = span.0.borrow_mut();
    let text_width = state.text.chars().count() as f64 * CHAR_WIDTH;
    state.left = (width - text_width) / 2.0;
    state.top = (height - FONT_SIZE) / 2.0;
}

fn calculator(
    full_renders: &Rc<Cell<usize>>,
    resizes: &Rc<Cell<usize>>,
) -> ViewType<VisualModel, Span> {
    ViewType::builder("Calculator")
        .update_all(immediate({
            let full_renders = Rc::clone(full_renders);
            move |view: &CalcView| {
                full_renders.set(full_renders.get() + 1);
                let span = view.dom_node().unwrap_or_default();
                let result = calculate(view.model())
                    .map_or_else(|| "-".to_string(), |value| value.to_string());
                span.0.borrow_mut().text = format!("Result {result}");
                center(view.model(), &span);
                view.set_dom_node(span)?;
                anyhow::Ok(())
            }
        }))
        .update_groups(
            &["Size"],
            immediate({
                let resizes = Rc::clone(resizes);
                move |view: &CalcView| {
                    resizes.set(resizes.get() + 1);
                    let span = view
                        .dom_node()
                        .ok_or_else(|| anyhow::anyhow!("calculator resized before it rendered"))?;
                    center(view.model(), &span);
                    anyhow::Ok(())
                }
            }),
        )
        .build()
        .unwrap()
}

fn sales() -> Value {
    json!([
        { "region": "north", "sales": 12 },
        { "region": "south", "sales": 30 },
        { "region": "east", "sales": null },
        { "region": "west", "sales": 18 },
    ])
}

fn model() -> Rc<VisualModel> {
    Rc::new(VisualModel::from_json(json!({
        "data": sales(),
        "measure": "sales",
        "operation": "max",
        "width": 400,
        "height": 300,
    })))
}

#[test]
fn renders_the_result_centered() {
    let (full, resizes) = (Rc::default(), Rc::default());
    let view = View::new(model(), &calculator(&full, &resizes));
    let created = Rc::new(Cell::new(0));
    view.events().on_did_create({
        let created = Rc::clone(&created);
        move |_span: &Span| created.set(created.get() + 1)
    });

    block_on(view.update()).unwrap();

    let span = view.dom_node().unwrap();
    assert_eq!(span.text(), "Result 30");
    assert_eq!(span.position(), (155.0, 129.0));
    assert_eq!((full.get(), resizes.get()), (1, 0));
    assert_eq!(created.get(), 1);
}

#[test]
fn resizing_only_recenters() {
    let (full, resizes) = (Rc::default(), Rc::default());
    let model = model();
    let view = View::new(Rc::clone(&model), &calculator(&full, &resizes));
    block_on(view.update()).unwrap();

    model.resize(600.0, 100.0);

    let span = view.dom_node().unwrap();
    assert_eq!((full.get(), resizes.get()), (1, 1));
    assert_eq!(span.text(), "Result 30");
    assert_eq!(span.position(), (255.0, 29.0));
    assert!(!view.is_dirty());
}

#[test]
fn changing_the_operation_rerenders_in_place() {
    let (full, resizes) = (Rc::default(), Rc::default());
    let model = model();
    let view = View::new(Rc::clone(&model), &calculator(&full, &resizes));
    block_on(view.update()).unwrap();
    let first = view.dom_node().unwrap();

    model.set("operation", "min");
    assert_eq!(first.text(), "Result 12");

    model.set("operation", "avg");
    assert_eq!(first.text(), "Result 15");

    assert_eq!(view.dom_node(), Some(first));
    assert_eq!((full.get(), resizes.get()), (3, 0));
}

#[test]
fn selection_mode_does_not_rerender() {
    let (full, resizes) = (Rc::default(), Rc::default());
    let model = model();
    let view = View::new(Rc::clone(&model), &calculator(&full, &resizes));
    block_on(view.update()).unwrap();

    model.set_selection_mode(SelectionMode::Add);

    assert_eq!((full.get(), resizes.get()), (1, 0));
    assert!(!view.is_dirty());
}

#[test]
fn missing_data_rejects_the_update() {
    let (full, resizes) = (Rc::default(), Rc::default());
    let model = model();
    model.remove("data");
    let view = View::builder(Rc::clone(&model), &calculator(&full, &resizes))
        .settings(Settings::default().view)
        .build();

    let error = block_on(view.update()).unwrap_err();

    assert!(error.is_invalid());
    assert!(error.to_string().contains("Property 'data' is required."));
    assert_eq!(full.get(), 0);
    assert!(view.dom_node().is_none());

    model.set_data(json!([{ "sales": 7 }]));
    assert_eq!(view.dom_node().unwrap().text(), "Result 7");
}
