//! End-to-end tests over a small order schema
//!
//! Components are assembled by hand the way a schema builder would, then
//! attribute occurrences are validated and identity constraints compiled
//! and bound.

use pretty_assertions::assert_eq;
use std::sync::Arc;

use xmlschema_compiler::validators::{
    AnyAttribute, AttributePool, AttributePresence, AttributeResolver, AttributeType,
    AttributeUse, AttributeValidator, BuiltinComponents, Component, ComponentKind, EventCode,
    GlobalMaps, IdentityConstraintCompiler, IdentityConstraintDefinition, IdentityConstraintSet,
    InsertOutcome, NamespaceConstraint, NamespaceWildcard, ProcessContents, Severity,
    ValidationEvent, ValidationEventSink, XsdAttribute, XsdAttributeGroup,
};
use xmlschema_compiler::{
    Error, InternalError, NamespaceContext, QName, XMLNS_NAMESPACE, XML_NAMESPACE, XSI_NAMESPACE,
};

const SHOP: &str = "urn:shop";

fn shop(local: &str) -> QName {
    QName::namespaced(SHOP, local)
}

fn global_attributes() -> AttributePool {
    let mut pool = AttributePool::new();
    pool.insert(Arc::new(XsdAttribute::new(shop("currency"), AttributeType::string())));
    pool.insert(Arc::new(XsdAttribute::new(shop("ref"), AttributeType::id())));
    pool
}

/// `item` type: a required `sku`, an optional `note`, `##other` lax wildcard
fn item_attributes() -> XsdAttributeGroup {
    let mut group = XsdAttributeGroup::anonymous();
    group
        .add_attribute(Arc::new(
            XsdAttribute::untyped(QName::local("sku")).with_use(AttributeUse::Required),
        ))
        .unwrap();
    let mut note = XsdAttribute::untyped(QName::local("note"));
    note.set_default("none").unwrap();
    group.add_attribute(Arc::new(note)).unwrap();
    group.set_any_attribute(AnyAttribute::new(
        NamespaceWildcard::parse("##other", SHOP).unwrap(),
        ProcessContents::Lax,
    ));
    group
}

/// Extension of `item` adding a strict `##targetNamespace` wildcard
fn special_item_attributes() -> XsdAttributeGroup {
    let mut group = XsdAttributeGroup::anonymous();
    group.set_any_attribute(AnyAttribute::new(
        NamespaceWildcard::parse("##targetNamespace", SHOP).unwrap(),
        ProcessContents::Strict,
    ));
    group.extend_from(&item_attributes()).unwrap();
    group
}

#[test]
fn extension_wildcard_is_union() {
    let group = special_item_attributes();
    let any = group.any_attribute().unwrap();
    assert_eq!(
        any.namespaces.constraint(),
        &NamespaceConstraint::Other(String::new())
    );
    assert_eq!(any.process_contents, ProcessContents::Strict);
    assert!(group.get_attribute(&QName::local("sku")).is_some());
}

#[test]
fn validate_element_attributes() {
    let globals = global_attributes();
    let element = special_item_attributes();
    let validator =
        AttributeValidator::new(AttributeResolver::new(&globals, BuiltinComponents::xml()));
    let mut presence = AttributePresence::for_element(&element);

    let observed = [
        QName::local("sku"),
        shop("currency"),
        QName::namespaced("urn:other", "x"),
        QName::namespaced(XML_NAMESPACE, "lang"),
        QName::namespaced(XSI_NAMESPACE, "type"),
        QName::namespaced(XMLNS_NAMESPACE, "p"),
        QName::local("sku"),
        QName::local("color"),
    ];

    let mut events: Vec<ValidationEvent> = Vec::new();
    let matched = {
        let mut sink = ValidationEventSink::with_handler(&mut events);
        let mut matched = Vec::new();
        for name in &observed {
            if let Some(decl) = validator
                .validate_attribute(&mut presence, name, &mut sink)
                .unwrap()
            {
                matched.push(decl.name().clone());
            }
        }
        validator.validate_required(&presence, &mut sink).unwrap();
        matched
    };

    assert_eq!(
        matched,
        vec![
            QName::local("sku"),
            shop("currency"),
            QName::namespaced(XML_NAMESPACE, "lang"),
        ]
    );

    let codes: Vec<(EventCode, Severity)> = events.iter().map(|e| (e.code, e.severity)).collect();
    assert_eq!(
        codes,
        vec![
            (EventCode::UndeclaredAttribute, Severity::Error),
            (EventCode::DuplicateAttribute, Severity::Error),
            (EventCode::ProhibitedAttribute, Severity::Error),
        ]
    );

    let defaults = validator.unspecified_defaults(&presence);
    assert_eq!(defaults.len(), 1);
    assert_eq!(defaults[0].default_value(), Some("none"));
}

#[test]
fn wildcard_id_attribute_conflicts_with_declared_id() {
    let globals = global_attributes();
    let mut element = item_attributes();
    element
        .add_attribute(Arc::new(XsdAttribute::new(QName::local("key"), AttributeType::id())))
        .unwrap();
    element.set_any_attribute(AnyAttribute::new(
        NamespaceWildcard::any(),
        ProcessContents::Strict,
    ));

    let validator =
        AttributeValidator::new(AttributeResolver::new(&globals, BuiltinComponents::xml()));
    let mut presence = AttributePresence::for_element(&element);

    let mut events: Vec<ValidationEvent> = Vec::new();
    {
        let mut sink = ValidationEventSink::with_handler(&mut events);
        let found = validator
            .validate_attribute(&mut presence, &shop("ref"), &mut sink)
            .unwrap();
        assert!(found.is_none());
        validator.validate_required(&presence, &mut sink).unwrap();
    }

    let codes: Vec<EventCode> = events.iter().map(|e| e.code).collect();
    assert_eq!(
        codes,
        vec![EventCode::AttrUseAndWildId, EventCode::MissingRequiredAttribute]
    );
    assert_eq!(events[1].args, vec!["sku".to_string()]);
}

#[test]
fn fail_fast_without_handler() {
    let globals = global_attributes();
    let element = item_attributes();
    let validator =
        AttributeValidator::new(AttributeResolver::new(&globals, BuiltinComponents::xml()));
    let mut presence = AttributePresence::for_element(&element);
    let mut sink = ValidationEventSink::new();

    // Lax wildcard: advisory only.
    validator
        .validate_attribute(&mut presence, &QName::namespaced("urn:other", "x"), &mut sink)
        .unwrap();
    assert_eq!(sink.warning_count(), 1);

    let err = validator
        .validate_attribute(&mut presence, &QName::local("undeclared"), &mut sink)
        .unwrap_err();
    match err {
        Error::Validation(e) => assert_eq!(e.code(), EventCode::ProhibitedAttribute),
        other => panic!("unexpected error: {}", other),
    }
    assert_eq!(sink.error_count(), 1);
}

#[test]
fn handler_failure_propagates_unchanged() {
    let globals = AttributePool::new();
    let validator =
        AttributeValidator::new(AttributeResolver::new(&globals, BuiltinComponents::xml()));
    let mut presence = AttributePresence::undeclared(ProcessContents::Lax);

    let mut seen = 0;
    let mut handler = |_: &ValidationEvent| -> xmlschema_compiler::Result<()> {
        seen += 1;
        Err(InternalError::new("stop").into())
    };
    let result = {
        let mut sink = ValidationEventSink::with_handler(&mut handler);
        validator.validate_attribute(&mut presence, &QName::local("a"), &mut sink)
    };

    assert!(matches!(result, Err(Error::Internal(ref e)) if e.message == "stop"));
    assert_eq!(seen, 1);
}

#[test]
fn user_declaration_replaces_xml_builtin() {
    let mut maps = GlobalMaps::new()
        .with_builtins(BuiltinComponents::xml())
        .unwrap();
    let lang = QName::namespaced(XML_NAMESPACE, "lang");
    let builtin = maps.lookup_attribute(&lang).unwrap();

    let mut sink = ValidationEventSink::new();
    let (user, outcome) = maps
        .declare(Component::new(ComponentKind::Attribute, lang.clone()), &mut sink)
        .unwrap();

    assert_eq!(outcome, InsertOutcome::Replaced(builtin));
    assert_eq!(maps.lookup_attribute(&lang), Some(user));
    assert_eq!(maps.insert(builtin, &mut sink).unwrap(), InsertOutcome::Discarded);
    assert_eq!(maps.lookup_attribute(&lang), Some(user));
}

#[test]
fn redefine_then_duplicate() {
    let mut maps = GlobalMaps::new();
    let mut events: Vec<ValidationEvent> = Vec::new();
    let outcomes = {
        let mut sink = ValidationEventSink::with_handler(&mut events);
        let (original, _) = maps
            .declare(Component::new(ComponentKind::AttributeGroup, shop("common")), &mut sink)
            .unwrap();
        let (_, redefined) = maps
            .declare(
                Component::new(ComponentKind::AttributeGroup, shop("common"))
                    .with_redefined(original),
                &mut sink,
            )
            .unwrap();
        let (_, duplicate) = maps
            .declare(Component::new(ComponentKind::AttributeGroup, shop("common")), &mut sink)
            .unwrap();
        (original, redefined, duplicate)
    };

    assert_eq!(outcomes.1, InsertOutcome::Replaced(outcomes.0));
    assert_eq!(outcomes.2, InsertOutcome::Duplicate);
    assert_eq!(events.len(), 1);
    assert_eq!(
        events[0].message(),
        "The attributeGroup '{urn:shop}common' has already been declared."
    );
}

#[test]
fn identity_constraints_compile_and_bind() {
    let mut ctx = NamespaceContext::new().with_prefix("s", SHOP);
    ctx.set_default_namespace(SHOP);

    let compiler = IdentityConstraintCompiler::new();
    let definitions = [
        IdentityConstraintDefinition::keyref(shop("lineItem"), ".//s:line", "itemKey")
            .with_field("@sku"),
        IdentityConstraintDefinition::key(shop("itemKey"), "s:items/s:item | s:extra/s:item")
            .with_field("@sku"),
        IdentityConstraintDefinition::unique(shop("noteUnique"), ".//s:item[@note]")
            .with_fields(["@note", "s:label"]),
    ];

    let mut maps = GlobalMaps::new();
    let mut set = IdentityConstraintSet::new();
    let mut sink = ValidationEventSink::new();
    for def in &definitions {
        let compiled = compiler.compile(def, &ctx).unwrap();
        assert_eq!(
            set.add(&mut maps, compiled, &mut sink).unwrap(),
            InsertOutcome::Inserted
        );
    }

    let key = set.get(&shop("itemKey")).unwrap();
    assert_eq!(key.selector().branches().len(), 2);
    assert!(key
        .selector()
        .matches_elements(&[shop("extra"), shop("item")]));

    let bindings = set.bind_keyrefs(&mut sink).unwrap();
    assert_eq!(bindings.len(), 1);
    assert!(Arc::ptr_eq(&bindings[0].target, key));
    assert!(!sink.has_errors());
}

#[test]
fn rejected_selector_names_the_selector() {
    let ctx = NamespaceContext::new().with_prefix("s", SHOP);
    let def = IdentityConstraintDefinition::unique(shop("u"), "s:items//s:item").with_field("@sku");

    let err = IdentityConstraintCompiler::new().compile(&def, &ctx).unwrap_err();
    assert_eq!(err.component.as_deref(), Some("selector"));
    assert_eq!(err.source.as_deref(), Some("s:items//s:item"));
    assert!(err.to_string().starts_with("selector: "));
}
