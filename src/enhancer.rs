use super::*;

pub(crate) const ADD_BUTTON_ID: &str = "add_custom_field_btn";
pub(crate) const CONTAINER_ID: &str = "custom_fields_container";
pub(crate) const SELECT_ALL_ID: &str = "select_all_participants";
pub(crate) const PARTICIPANT_NAME: &str = "participant_ids";
pub(crate) const KEY_FIELD_NAME: &str = "custom_field_keys[]";
pub(crate) const VALUE_FIELD_NAME: &str = "custom_field_values[]";
pub(crate) const REMOVE_BUTTON_CLASS: &str = "remove-custom-field-btn";

/// Native event handlers, stored as data in the listener table instead of
/// closures so the harness can clone and replay them freely.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Behavior {
    AddCustomFieldRow { container: NodeId },
    RemoveCustomFieldRow { row: NodeId },
    BroadcastSelectAll { trigger: NodeId },
}

/// Wires the page enhancements once, after parsing. Each feature checks for
/// its own markup and stays inactive when the page lacks it, so the same
/// wiring is safe on every page of the app.
pub(crate) fn install(harness: &mut Harness) {
    let add_button = harness.dom.by_id(ADD_BUTTON_ID);
    let container = harness.dom.by_id(CONTAINER_ID);
    if let (Some(add_button), Some(container)) = (add_button, container) {
        harness
            .listeners
            .add(add_button, "click", Behavior::AddCustomFieldRow { container });
    }

    if let Some(trigger) = harness.dom.by_id(SELECT_ALL_ID) {
        harness
            .listeners
            .add(trigger, "change", Behavior::BroadcastSelectAll { trigger });
    }
}

pub(crate) fn run(harness: &mut Harness, behavior: Behavior) -> Result<()> {
    match behavior {
        Behavior::AddCustomFieldRow { container } => add_custom_field_row(harness, container),
        Behavior::RemoveCustomFieldRow { row } => remove_custom_field_row(harness, row),
        Behavior::BroadcastSelectAll { trigger } => broadcast_select_all(harness, trigger),
    }
}

// One key/value row: two required text inputs submitted with the enclosing
// form, plus the button that removes exactly this row.
fn add_custom_field_row(harness: &mut Harness, container: NodeId) -> Result<()> {
    let dom = &mut harness.dom;

    let row = dom.create_detached_element("div");
    dom.set_attr(row, "class", "row mb-2 g-2 align-items-center")?;

    let key_cell = dom.create_detached_element("div");
    dom.set_attr(key_cell, "class", "col-5")?;
    let key_input = text_input(dom, KEY_FIELD_NAME, "Field Name (e.g., Signature)")?;
    dom.append_child(key_cell, key_input)?;

    let value_cell = dom.create_detached_element("div");
    dom.set_attr(value_cell, "class", "col-5")?;
    let value_input = text_input(dom, VALUE_FIELD_NAME, "Field Value")?;
    dom.append_child(value_cell, value_input)?;

    let button_cell = dom.create_detached_element("div");
    dom.set_attr(button_cell, "class", "col-2")?;
    let remove_button = dom.create_detached_element("button");
    dom.set_attr(remove_button, "type", "button")?;
    dom.set_attr(
        remove_button,
        "class",
        &format!("btn btn-danger btn-sm {REMOVE_BUTTON_CLASS}"),
    )?;
    dom.create_text(remove_button, "X".to_string());
    dom.append_child(button_cell, remove_button)?;

    dom.append_child(row, key_cell)?;
    dom.append_child(row, value_cell)?;
    dom.append_child(row, button_cell)?;
    dom.append_child(container, row)?;

    harness
        .listeners
        .add(remove_button, "click", Behavior::RemoveCustomFieldRow { row });
    Ok(())
}

fn text_input(dom: &mut Dom, name: &str, placeholder: &str) -> Result<NodeId> {
    let input = dom.create_detached_element("input");
    dom.set_attr(input, "type", "text")?;
    dom.set_attr(input, "class", "form-control form-control-sm")?;
    dom.set_attr(input, "name", name)?;
    dom.set_attr(input, "placeholder", placeholder)?;
    dom.set_attr(input, "required", "")?;
    Ok(input)
}

fn remove_custom_field_row(harness: &mut Harness, row: NodeId) -> Result<()> {
    let subtree = harness.dom.subtree_nodes(row);
    harness.dom.detach(row)?;
    for node in subtree {
        harness.listeners.drop_node(node);
    }
    Ok(())
}

// One-shot broadcast of the trigger's state; deliberately not a two-way
// binding, later individual toggles leave the trigger alone.
fn broadcast_select_all(harness: &mut Harness, trigger: NodeId) -> Result<()> {
    let checked = harness.dom.checked(trigger)?;
    let boxes = harness.select_all(&format!("input[name=\"{PARTICIPANT_NAME}\"]"))?;
    for checkbox in boxes {
        harness.dom.set_checked(checkbox, checked)?;
    }
    Ok(())
}
