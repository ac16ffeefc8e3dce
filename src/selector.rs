use super::*;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum SelectorAttrCondition {
    Exists { key: String },
    Eq { key: String, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum SelectorPseudoClass {
    Checked,
    NthChild(usize),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct SelectorStep {
    pub(crate) tag: Option<String>,
    pub(crate) universal: bool,
    pub(crate) id: Option<String>,
    pub(crate) classes: Vec<String>,
    pub(crate) attrs: Vec<SelectorAttrCondition>,
    pub(crate) pseudo_classes: Vec<SelectorPseudoClass>,
}

impl SelectorStep {
    pub(crate) fn id_only(&self) -> Option<&str> {
        if !self.universal
            && self.tag.is_none()
            && self.classes.is_empty()
            && self.attrs.is_empty()
            && self.pseudo_classes.is_empty()
        {
            self.id.as_deref()
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SelectorCombinator {
    Descendant,
    Child,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SelectorPart {
    pub(crate) step: SelectorStep,
    // Relation to previous (left) selector part.
    pub(crate) combinator: Option<SelectorCombinator>,
}

pub(crate) fn parse_selector_chain(selector: &str) -> Result<Vec<SelectorPart>> {
    let selector = selector.trim();
    if selector.is_empty() {
        return Err(Error::UnsupportedSelector(selector.into()));
    }

    let tokens = tokenize_selector(selector)?;
    let mut steps = Vec::new();
    let mut pending_combinator: Option<SelectorCombinator> = None;

    for token in tokens {
        if token == ">" {
            if pending_combinator.is_some() || steps.is_empty() {
                return Err(Error::UnsupportedSelector(selector.into()));
            }
            pending_combinator = Some(SelectorCombinator::Child);
            continue;
        }

        let step = parse_selector_step(&token)?;
        let combinator = if steps.is_empty() {
            None
        } else {
            Some(pending_combinator.unwrap_or(SelectorCombinator::Descendant))
        };
        pending_combinator = None;
        steps.push(SelectorPart { step, combinator });
    }

    if pending_combinator.is_some() || steps.is_empty() {
        return Err(Error::UnsupportedSelector(selector.into()));
    }
    Ok(steps)
}

fn tokenize_selector(selector: &str) -> Result<Vec<String>> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_brackets = false;
    let mut quote: Option<char> = None;

    for ch in selector.chars() {
        if let Some(q) = quote {
            current.push(ch);
            if ch == q {
                quote = None;
            }
            continue;
        }
        match ch {
            '\'' | '"' if in_brackets => {
                quote = Some(ch);
                current.push(ch);
            }
            '[' => {
                if in_brackets {
                    return Err(Error::UnsupportedSelector(selector.into()));
                }
                in_brackets = true;
                current.push(ch);
            }
            ']' => {
                if !in_brackets {
                    return Err(Error::UnsupportedSelector(selector.into()));
                }
                in_brackets = false;
                current.push(ch);
            }
            '>' if !in_brackets => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
                tokens.push(">".to_string());
            }
            ch if ch.is_whitespace() && !in_brackets => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            }
            ch => current.push(ch),
        }
    }

    if in_brackets || quote.is_some() {
        return Err(Error::UnsupportedSelector(selector.into()));
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    Ok(tokens)
}

fn parse_selector_step(token: &str) -> Result<SelectorStep> {
    let mut step = SelectorStep::default();
    let chars: Vec<char> = token.chars().collect();
    let mut i = 0usize;

    fn take_name(chars: &[char], i: &mut usize) -> String {
        let start = *i;
        while *i < chars.len()
            && (chars[*i].is_ascii_alphanumeric() || chars[*i] == '-' || chars[*i] == '_')
        {
            *i += 1;
        }
        chars[start..*i].iter().collect()
    }

    if i < chars.len() && chars[i] == '*' {
        step.universal = true;
        i += 1;
    } else if i < chars.len() && chars[i].is_ascii_alphabetic() {
        step.tag = Some(take_name(&chars, &mut i).to_ascii_lowercase());
    }

    while i < chars.len() {
        match chars[i] {
            '#' => {
                i += 1;
                let name = take_name(&chars, &mut i);
                if name.is_empty() || step.id.is_some() {
                    return Err(Error::UnsupportedSelector(token.into()));
                }
                step.id = Some(name);
            }
            '.' => {
                i += 1;
                let name = take_name(&chars, &mut i);
                if name.is_empty() {
                    return Err(Error::UnsupportedSelector(token.into()));
                }
                step.classes.push(name);
            }
            '[' => {
                i += 1;
                let key = take_name(&chars, &mut i).to_ascii_lowercase();
                if key.is_empty() {
                    return Err(Error::UnsupportedSelector(token.into()));
                }
                if i < chars.len() && chars[i] == ']' {
                    i += 1;
                    step.attrs.push(SelectorAttrCondition::Exists { key });
                    continue;
                }
                if i >= chars.len() || chars[i] != '=' {
                    return Err(Error::UnsupportedSelector(token.into()));
                }
                i += 1;
                let value = parse_attr_value(&chars, &mut i, token)?;
                if i >= chars.len() || chars[i] != ']' {
                    return Err(Error::UnsupportedSelector(token.into()));
                }
                i += 1;
                step.attrs.push(SelectorAttrCondition::Eq { key, value });
            }
            ':' => {
                i += 1;
                let name = take_name(&chars, &mut i);
                match name.as_str() {
                    "checked" => step.pseudo_classes.push(SelectorPseudoClass::Checked),
                    "nth-child" => {
                        if i >= chars.len() || chars[i] != '(' {
                            return Err(Error::UnsupportedSelector(token.into()));
                        }
                        i += 1;
                        let digit_start = i;
                        while i < chars.len() && chars[i].is_ascii_digit() {
                            i += 1;
                        }
                        let digits: String = chars[digit_start..i].iter().collect();
                        if i >= chars.len() || chars[i] != ')' {
                            return Err(Error::UnsupportedSelector(token.into()));
                        }
                        i += 1;
                        let position = digits
                            .parse::<usize>()
                            .map_err(|_| Error::UnsupportedSelector(token.into()))?;
                        if position == 0 {
                            return Err(Error::UnsupportedSelector(token.into()));
                        }
                        step.pseudo_classes
                            .push(SelectorPseudoClass::NthChild(position));
                    }
                    _ => return Err(Error::UnsupportedSelector(token.into())),
                }
            }
            _ => return Err(Error::UnsupportedSelector(token.into())),
        }
    }

    if !step.universal
        && step.tag.is_none()
        && step.id.is_none()
        && step.classes.is_empty()
        && step.attrs.is_empty()
        && step.pseudo_classes.is_empty()
    {
        return Err(Error::UnsupportedSelector(token.into()));
    }
    Ok(step)
}

fn parse_attr_value(chars: &[char], i: &mut usize, token: &str) -> Result<String> {
    if *i < chars.len() && (chars[*i] == '"' || chars[*i] == '\'') {
        let quote = chars[*i];
        *i += 1;
        let start = *i;
        while *i < chars.len() && chars[*i] != quote {
            *i += 1;
        }
        if *i >= chars.len() {
            return Err(Error::UnsupportedSelector(token.into()));
        }
        let value: String = chars[start..*i].iter().collect();
        *i += 1;
        Ok(value)
    } else {
        let start = *i;
        while *i < chars.len() && chars[*i] != ']' {
            *i += 1;
        }
        Ok(chars[start..*i].iter().collect())
    }
}

impl Dom {
    pub(crate) fn matches_selector_chain(&self, node_id: NodeId, steps: &[SelectorPart]) -> bool {
        if steps.is_empty() {
            return false;
        }
        if !self.matches_step(node_id, &steps[steps.len() - 1].step) {
            return false;
        }

        let mut current = node_id;
        for idx in (1..steps.len()).rev() {
            let prev_step = &steps[idx - 1].step;
            let combinator = steps[idx]
                .combinator
                .unwrap_or(SelectorCombinator::Descendant);

            let matched = match combinator {
                SelectorCombinator::Child => {
                    let Some(parent) = self.parent(current) else {
                        return false;
                    };
                    if self.matches_step(parent, prev_step) {
                        Some(parent)
                    } else {
                        None
                    }
                }
                SelectorCombinator::Descendant => {
                    let mut cursor = self.parent(current);
                    let mut found = None;
                    while let Some(ancestor) = cursor {
                        if self.matches_step(ancestor, prev_step) {
                            found = Some(ancestor);
                            break;
                        }
                        cursor = self.parent(ancestor);
                    }
                    found
                }
            };

            let Some(next) = matched else {
                return false;
            };
            current = next;
        }

        true
    }

    fn matches_step(&self, node_id: NodeId, step: &SelectorStep) -> bool {
        let Some(element) = self.element(node_id) else {
            return false;
        };

        if let Some(tag) = &step.tag {
            if !element.tag_name.eq_ignore_ascii_case(tag) {
                return false;
            }
        }
        if let Some(id) = &step.id {
            if element.attrs.get("id") != Some(id) {
                return false;
            }
        }
        for class in &step.classes {
            if !has_class(element, class) {
                return false;
            }
        }
        for condition in &step.attrs {
            let matched = match condition {
                SelectorAttrCondition::Exists { key } => element.attrs.contains_key(key),
                SelectorAttrCondition::Eq { key, value } => {
                    element.attrs.get(key) == Some(value)
                }
            };
            if !matched {
                return false;
            }
        }
        for pseudo in &step.pseudo_classes {
            match pseudo {
                SelectorPseudoClass::Checked => {
                    if !element.checked {
                        return false;
                    }
                }
                SelectorPseudoClass::NthChild(position) => {
                    if self.element_child_position(node_id) != Some(*position) {
                        return false;
                    }
                }
            }
        }
        true
    }

    // 1-based position among the parent's element children.
    fn element_child_position(&self, node_id: NodeId) -> Option<usize> {
        let parent = self.parent(node_id)?;
        let mut position = 0usize;
        for child in &self.nodes[parent.0].children {
            if matches!(self.nodes[child.0].node_type, NodeType::Element(_)) {
                position += 1;
                if *child == node_id {
                    return Some(position);
                }
            }
        }
        None
    }
}
