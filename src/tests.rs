use super::*;

const ADD_PARTICIPANT_PAGE: &str = r#"
    <form id='add_participant_form' method='post'>
      <input type='text' id='name' name='name' required>
      <input type='text' id='email' name='email'>
      <h5>Custom Fields</h5>
      <div id='custom_fields_container'></div>
      <button type='button' id='add_custom_field_btn' class='btn btn-secondary btn-sm'>Add Custom Field</button>
      <button type='submit'>Add Participant</button>
    </form>
    "#;

const PARTICIPANTS_PAGE: &str = r#"
    <form method='post'>
      <table class='table'>
        <thead>
          <tr>
            <th><input type='checkbox' id='select_all_participants'></th>
            <th>Name</th>
          </tr>
        </thead>
        <tbody>
          <tr><td><input type='checkbox' name='participant_ids' value='1'></td><td>Ada</td></tr>
          <tr><td><input type='checkbox' name='participant_ids' value='2'></td><td>Grace</td></tr>
          <tr><td><input type='checkbox' name='participant_ids' value='3' checked></td><td>Joan</td></tr>
        </tbody>
      </table>
    </form>
    "#;

const ROWS: &str = "#custom_fields_container > div";
const PARTICIPANTS: &str = "input[name='participant_ids']";

#[test]
fn add_button_appends_one_row_per_click() -> Result<()> {
    let mut h = Harness::from_html(ADD_PARTICIPANT_PAGE)?;
    h.assert_count(ROWS, 0)?;

    for expected in 1..=4usize {
        h.click("#add_custom_field_btn")?;
        h.assert_count(ROWS, expected)?;
    }

    h.assert_count("#custom_fields_container input", 8)?;
    h.assert_count("#custom_fields_container button.remove-custom-field-btn", 4)?;
    for row in 1..=4usize {
        h.assert_value(
            &format!("{ROWS}:nth-child({row}) input[name='custom_field_keys[]']"),
            "",
        )?;
        h.assert_value(
            &format!("{ROWS}:nth-child({row}) input[name='custom_field_values[]']"),
            "",
        )?;
    }
    Ok(())
}

#[test]
fn generated_row_has_required_named_inputs_and_remove_control() -> Result<()> {
    let mut h = Harness::from_html(ADD_PARTICIPANT_PAGE)?;
    h.click("#add_custom_field_btn")?;

    h.assert_count("#custom_fields_container input[required]", 2)?;
    h.assert_exists("#custom_fields_container input[placeholder='Field Name (e.g., Signature)']")?;
    h.assert_exists("#custom_fields_container input[placeholder='Field Value']")?;
    h.assert_exists(&format!("{ROWS} div.col-2 > button[type='button']"))?;
    h.assert_text("#custom_fields_container button.remove-custom-field-btn", "X")?;
    Ok(())
}

#[test]
fn remove_button_detaches_exactly_its_own_row() -> Result<()> {
    let mut h = Harness::from_html(ADD_PARTICIPANT_PAGE)?;
    for _ in 0..3 {
        h.click("#add_custom_field_btn")?;
    }
    for row in 1..=3usize {
        h.type_text(
            &format!("{ROWS}:nth-child({row}) input[name='custom_field_keys[]']"),
            &format!("key-{row}"),
        )?;
        h.type_text(
            &format!("{ROWS}:nth-child({row}) input[name='custom_field_values[]']"),
            &format!("value-{row}"),
        )?;
    }

    h.click(&format!("{ROWS}:nth-child(2) button.remove-custom-field-btn"))?;

    h.assert_count(ROWS, 2)?;
    h.assert_value(
        &format!("{ROWS}:nth-child(1) input[name='custom_field_keys[]']"),
        "key-1",
    )?;
    h.assert_value(
        &format!("{ROWS}:nth-child(1) input[name='custom_field_values[]']"),
        "value-1",
    )?;
    h.assert_value(
        &format!("{ROWS}:nth-child(2) input[name='custom_field_keys[]']"),
        "key-3",
    )?;
    h.assert_value(
        &format!("{ROWS}:nth-child(2) input[name='custom_field_values[]']"),
        "value-3",
    )?;
    Ok(())
}

#[test]
fn removing_every_row_leaves_container_empty_and_add_still_works() -> Result<()> {
    let mut h = Harness::from_html(ADD_PARTICIPANT_PAGE)?;
    for _ in 0..2 {
        h.click("#add_custom_field_btn")?;
    }
    h.click(&format!("{ROWS}:nth-child(1) button.remove-custom-field-btn"))?;
    h.click(&format!("{ROWS}:nth-child(1) button.remove-custom-field-btn"))?;
    h.assert_count(ROWS, 0)?;

    h.click("#add_custom_field_btn")?;
    h.assert_count(ROWS, 1)?;
    Ok(())
}

#[test]
fn duplicate_field_names_across_rows_are_allowed() -> Result<()> {
    let mut h = Harness::from_html(ADD_PARTICIPANT_PAGE)?;
    h.click("#add_custom_field_btn")?;
    h.click("#add_custom_field_btn")?;
    for row in 1..=2usize {
        h.type_text(
            &format!("{ROWS}:nth-child({row}) input[name='custom_field_keys[]']"),
            "Signature",
        )?;
    }
    h.assert_count(ROWS, 2)?;
    h.assert_value(
        &format!("{ROWS}:nth-child(2) input[name='custom_field_keys[]']"),
        "Signature",
    )?;
    Ok(())
}

#[test]
fn add_feature_is_inactive_without_container() -> Result<()> {
    let html = r#"
        <form>
          <button type='button' id='add_custom_field_btn'>Add Custom Field</button>
        </form>
        "#;
    let mut h = Harness::from_html(html)?;
    h.click("#add_custom_field_btn")?;
    h.click("#add_custom_field_btn")?;
    h.assert_count("div.row", 0)?;
    Ok(())
}

#[test]
fn page_without_add_button_keeps_container_unmodified() -> Result<()> {
    let html = r#"
        <form>
          <div id='custom_fields_container'><div class='row keep'>seeded</div></div>
        </form>
        "#;
    let mut h = Harness::from_html(html)?;
    h.dispatch("#custom_fields_container", "click")?;
    h.assert_count(ROWS, 1)?;
    h.assert_text("#custom_fields_container div.keep", "seeded")?;
    Ok(())
}

#[test]
fn select_all_click_checks_every_participant() -> Result<()> {
    let mut h = Harness::from_html(PARTICIPANTS_PAGE)?;
    h.assert_count(&format!("{PARTICIPANTS}:checked"), 1)?;

    h.click("#select_all_participants")?;
    h.assert_checked("#select_all_participants", true)?;
    h.assert_count(&format!("{PARTICIPANTS}:checked"), 3)?;
    Ok(())
}

#[test]
fn select_all_uncheck_clears_every_participant() -> Result<()> {
    let mut h = Harness::from_html(PARTICIPANTS_PAGE)?;
    h.set_checked("#select_all_participants", true)?;
    h.assert_count(&format!("{PARTICIPANTS}:checked"), 3)?;

    h.set_checked("#select_all_participants", false)?;
    h.assert_count(&format!("{PARTICIPANTS}:checked"), 0)?;
    Ok(())
}

#[test]
fn broadcast_overrides_mixed_manual_states() -> Result<()> {
    let mut h = Harness::from_html(PARTICIPANTS_PAGE)?;
    h.set_checked(&format!("{PARTICIPANTS}[value='1']"), true)?;
    h.set_checked(&format!("{PARTICIPANTS}[value='3']"), false)?;

    h.set_checked("#select_all_participants", true)?;
    h.assert_count(&format!("{PARTICIPANTS}:checked"), 3)?;
    Ok(())
}

#[test]
fn manual_toggle_after_broadcast_leaves_trigger_and_peers_alone() -> Result<()> {
    let mut h = Harness::from_html(PARTICIPANTS_PAGE)?;
    h.click("#select_all_participants")?;

    h.set_checked(&format!("{PARTICIPANTS}[value='2']"), false)?;

    h.assert_checked("#select_all_participants", true)?;
    h.assert_checked(&format!("{PARTICIPANTS}[value='1']"), true)?;
    h.assert_checked(&format!("{PARTICIPANTS}[value='2']"), false)?;
    h.assert_checked(&format!("{PARTICIPANTS}[value='3']"), true)?;
    Ok(())
}

#[test]
fn select_all_with_zero_participants_is_a_noop() -> Result<()> {
    let html = r#"
        <form>
          <input type='checkbox' id='select_all_participants'>
          <input type='checkbox' id='unrelated'>
        </form>
        "#;
    let mut h = Harness::from_html(html)?;
    h.click("#select_all_participants")?;
    h.assert_checked("#select_all_participants", true)?;
    h.assert_checked("#unrelated", false)?;
    Ok(())
}

#[test]
fn both_features_coexist_on_one_page() -> Result<()> {
    let html = r#"
        <form>
          <div id='custom_fields_container'></div>
          <button type='button' id='add_custom_field_btn'>Add</button>
          <input type='checkbox' id='select_all_participants'>
          <input type='checkbox' name='participant_ids' value='1'>
        </form>
        "#;
    let mut h = Harness::from_html(html)?;
    h.click("#add_custom_field_btn")?;
    h.click("#select_all_participants")?;
    h.assert_count(ROWS, 1)?;
    h.assert_checked(&format!("{PARTICIPANTS}[value='1']"), true)?;
    Ok(())
}

#[test]
fn disabled_add_button_ignores_clicks() -> Result<()> {
    let html = r#"
        <form>
          <div id='custom_fields_container'></div>
          <button type='button' id='add_custom_field_btn' disabled>Add</button>
        </form>
        "#;
    let mut h = Harness::from_html(html)?;
    h.click("#add_custom_field_btn")?;
    h.assert_count(ROWS, 0)?;
    Ok(())
}

#[test]
fn set_checked_on_non_checkbox_is_a_type_mismatch() -> Result<()> {
    let mut h = Harness::from_html(ADD_PARTICIPANT_PAGE)?;
    let err = h
        .set_checked("#name", true)
        .expect_err("text input is not a checkbox");
    match err {
        Error::TypeMismatch { expected, .. } => assert_eq!(expected, "checkbox input"),
        other => panic!("unexpected error: {other:?}"),
    }
    Ok(())
}

#[test]
fn missing_target_reports_selector_not_found() -> Result<()> {
    let mut h = Harness::from_html(ADD_PARTICIPANT_PAGE)?;
    let err = h.click("#no_such_control").expect_err("id is absent");
    assert_eq!(err, Error::SelectorNotFound("#no_such_control".into()));
    Ok(())
}

#[test]
fn unsupported_selector_syntax_is_rejected() -> Result<()> {
    let h = Harness::from_html(ADD_PARTICIPANT_PAGE)?;
    let err = h.count("input::after").expect_err("pseudo-elements are unsupported");
    assert!(matches!(err, Error::UnsupportedSelector(_)));
    Ok(())
}

#[test]
fn parser_decodes_entities_and_boolean_attrs() -> Result<()> {
    let html = r#"
        <p id='note'>Fish &amp; Chips &hellip;</p>
        <input id='field' type='text' value='a &quot;b&quot;' required>
        "#;
    let h = Harness::from_html(html)?;
    h.assert_text("#note", "Fish & Chips …")?;
    h.assert_value("#field", "a \"b\"")?;
    h.assert_count("input[required]", 1)?;
    Ok(())
}

#[test]
fn parser_applies_implied_closes_in_lists_and_tables() -> Result<()> {
    let html = r#"
        <ul id='menu'>
          <li>Events
          <li>Participants
          <li>Certificates
        </ul>
        <table id='grid'>
          <tr><td>a<td>b
          <tr><td>c<td>d
        </table>
        "#;
    let h = Harness::from_html(html)?;
    h.assert_count("#menu > li", 3)?;
    h.assert_count("#grid tr", 2)?;
    h.assert_count("#grid td", 4)?;
    Ok(())
}

#[test]
fn parser_rejects_unclosed_comment() {
    match Harness::from_html("<div><!-- dangling") {
        Err(err) => assert!(matches!(err, Error::HtmlParse(_))),
        Ok(_) => panic!("comment never closes"),
    }
}

#[test]
fn textarea_content_seeds_its_value() -> Result<()> {
    let h = Harness::from_html("<textarea id='notes'>Dear attendee</textarea>")?;
    h.assert_value("#notes", "Dear attendee")?;
    Ok(())
}

#[test]
fn script_and_style_bodies_are_not_parsed_as_markup() -> Result<()> {
    let html = r#"
        <style>p > span { color: red; }</style>
        <script src='/static/js/script.js'></script>
        <script>if (1 < 2) { window.x = '<div>'; }</script>
        <p id='real'>visible</p>
        "#;
    let h = Harness::from_html(html)?;
    h.assert_count("div", 0)?;
    h.assert_text("#real", "visible")?;
    Ok(())
}

#[test]
fn dump_dom_serializes_subtree() -> Result<()> {
    let h = Harness::from_html("<div id='box'><span>A</span>B</div>")?;
    assert_eq!(h.dump_dom("#box")?, "<div id=\"box\"><span>A</span>B</div>");
    Ok(())
}

#[test]
fn detached_row_id_space_survives_reuse() -> Result<()> {
    // Node ids are arena indices that stay stable after detachment, so a
    // remove followed by more adds never aliases an old row.
    let mut h = Harness::from_html(ADD_PARTICIPANT_PAGE)?;
    h.click("#add_custom_field_btn")?;
    h.type_text(
        &format!("{ROWS}:nth-child(1) input[name='custom_field_keys[]']"),
        "stale",
    )?;
    h.click(&format!("{ROWS}:nth-child(1) button.remove-custom-field-btn"))?;
    h.click("#add_custom_field_btn")?;
    h.assert_count(ROWS, 1)?;
    h.assert_value(
        &format!("{ROWS}:nth-child(1) input[name='custom_field_keys[]']"),
        "",
    )?;
    Ok(())
}

#[test]
fn deeply_nested_markup_stays_queryable() -> Result<()> {
    // Query walks and event dispatch must scale with tree depth without
    // growing the call stack.
    let depth = 150_000usize;
    let mut html = String::from("<input type='checkbox' id='select_all_participants'>");
    html.push_str(&"<div>".repeat(depth));
    html.push_str("<input type='checkbox' name='participant_ids' value='1'>");
    html.push_str(&"</div>".repeat(depth));

    let mut h = Harness::from_html(&html)?;
    h.assert_count(PARTICIPANTS, 1)?;
    h.click("#select_all_participants")?;
    h.assert_checked(&format!("{PARTICIPANTS}[value='1']"), true)?;
    h.assert_count(&format!("{PARTICIPANTS}:checked"), 1)?;
    Ok(())
}

#[test]
fn type_text_requires_a_text_entry_control() -> Result<()> {
    let mut h = Harness::from_html(PARTICIPANTS_PAGE)?;
    let err = h
        .type_text("#select_all_participants", "oops")
        .expect_err("checkbox is not a text entry");
    assert!(matches!(err, Error::TypeMismatch { .. }));
    Ok(())
}

#[test]
fn assertion_failure_carries_dom_snippet() -> Result<()> {
    let h = Harness::from_html("<p id='status'>pending</p>")?;
    let err = h.assert_text("#status", "done").expect_err("text differs");
    match err {
        Error::AssertionFailed {
            expected,
            actual,
            dom_snippet,
            ..
        } => {
            assert_eq!(expected, "done");
            assert_eq!(actual, "pending");
            assert!(dom_snippet.contains("pending"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    Ok(())
}
