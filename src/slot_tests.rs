//! Slot resolution and binding extraction, checked through the resolved tree
//! and through reference evaluation of the binding mapping.

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::ast::TemplateNode;
    use crate::binding::{extract_bindings, CodegenContext};
    use crate::error::{ERR_SLOT_COLLISION, ERR_SLOT_EVENT};
    use crate::options::PlatformFamily;
    use crate::parse::{parse_template, ParseOptions};
    use crate::slots::{resolve_slots, FallbackPolicy, OutletBase, SlotReport};

    fn resolve(source: &str, platform: PlatformFamily) -> SlotReport {
        let options = ParseOptions {
            platform,
            ..ParseOptions::default()
        };
        let mut nodes = parse_template(source, &options).unwrap();
        resolve_slots(&mut nodes, platform.capabilities())
    }

    fn bindings(source: &str, platform: PlatformFamily) -> CodegenContext {
        let options = ParseOptions {
            platform,
            ..ParseOptions::default()
        };
        let mut nodes = parse_template(source, &options).unwrap();
        let report = resolve_slots(&mut nodes, platform.capabilities());
        assert!(report.errors.is_empty(), "{:?}", report.errors);
        extract_bindings(&mut nodes, platform.capabilities())
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // IDENTITY
    // ═══════════════════════════════════════════════════════════════════════════

    #[test]
    fn test_default_outlet_follows_target() {
        let web = resolve("<slot/>", PlatformFamily::Web);
        assert_eq!(web.outlets[0].base, OutletBase::Static("default".to_string()));
        let mp = resolve("<slot name=\"default\"/>", PlatformFamily::Weixin);
        assert_eq!(mp.outlets[0].base, OutletBase::Static("d".to_string()));
    }

    #[test]
    fn test_constant_dynamic_name_folds() {
        let report = resolve("<slot :name=\"'header'\"/>", PlatformFamily::Web);
        assert_eq!(report.outlets[0].base, OutletBase::Static("header".to_string()));
    }

    #[test]
    fn test_dynamic_name_stays_dynamic() {
        let report = resolve("<slot :name=\"tab.id\"/>", PlatformFamily::Web);
        match &report.outlets[0].base {
            OutletBase::Dynamic(expr) => assert_eq!(expr.source(), "tab.id"),
            other => panic!("expected dynamic base, got {:?}", other),
        }
    }

    #[test]
    fn test_fallback_policy_follows_capabilities() {
        let source = "<slot>Default</slot><slot name=\"empty\"/>";
        let web = resolve(source, PlatformFamily::Android);
        assert_eq!(web.outlets[0].fallback, FallbackPolicy::Inline);
        assert_eq!(web.outlets[1].fallback, FallbackPolicy::None);
        let mp = resolve(source, PlatformFamily::Alipay);
        assert_eq!(mp.outlets[0].fallback, FallbackPolicy::DualBranch);
    }

    #[test]
    fn test_outlets_report_document_order_and_iteration() {
        let report = resolve(
            "<slot name=\"top\"/><view v-for=\"row in rows\"><slot name=\"cell\"/></view>",
            PlatformFamily::Web,
        );
        assert_eq!(report.outlets.len(), 2);
        assert!(!report.outlets[0].iterated);
        assert!(report.outlets[1].iterated);
        assert_eq!(report.outlets[0].path.to_string(), "/0");
    }

    #[test]
    fn test_usage_view_of_resolved_slot() {
        let options = ParseOptions {
            platform: PlatformFamily::Weixin,
            ..ParseOptions::default()
        };
        let mut nodes = parse_template("<slot>Hi</slot>", &options).unwrap();
        resolve_slots(&mut nodes, PlatformFamily::Weixin.capabilities());
        let TemplateNode::Slot(slot) = &nodes[0] else { panic!("expected a slot") };

        let usage = slot.usage().unwrap();
        assert_eq!(usage.static_name, Some("d"));
        assert!(usage.dynamic_name_expr.is_none());
        assert_eq!(usage.fallback_children.len(), 1);
        assert!(usage.enclosing_for_path.is_empty());
        assert_eq!(usage.fallback, FallbackPolicy::DualBranch);

        let resolution = slot.resolution.as_ref().unwrap();
        assert_eq!(resolution.identity_at(&[0, 1]).as_deref(), Some("d-0-1"));
        assert_eq!(resolution.identity_at(&[0, 0]).as_deref(), Some("d-0-0"));
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // COLLISIONS
    // ═══════════════════════════════════════════════════════════════════════════

    #[test]
    fn test_duplicate_outlet_collides() {
        let report = resolve("<slot name=\"a\"/><slot name=\"a\"/>", PlatformFamily::Web);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].code, ERR_SLOT_COLLISION);
        assert_eq!(report.errors[0].node_path.to_string(), "/1");
    }

    #[test]
    fn test_exclusive_branches_do_not_collide() {
        let report = resolve(
            "<slot v-if=\"wide\" name=\"a\"/><slot v-else name=\"a\"/>",
            PlatformFamily::Web,
        );
        assert!(report.errors.is_empty(), "{:?}", report.errors);
        assert_eq!(report.outlets.len(), 2);
    }

    #[test]
    fn test_default_and_named_default_collide() {
        let report = resolve("<slot/><slot name=\"default\"/>", PlatformFamily::Weixin);
        assert_eq!(report.errors[0].code, ERR_SLOT_COLLISION);
    }

    #[test]
    fn test_different_loop_domains_do_not_collide() {
        let report = resolve(
            "<slot name=\"a\"/><view v-for=\"x in xs\"><slot name=\"a\"/></view>",
            PlatformFamily::Web,
        );
        assert!(report.errors.is_empty());
    }

    #[test]
    fn test_sibling_loops_at_same_depth_collide() {
        let report = resolve(
            "<view v-for=\"x in xs\"><slot/></view><view v-for=\"y in ys\"><slot/></view>",
            PlatformFamily::Weixin,
        );
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].code, ERR_SLOT_COLLISION);
        assert_eq!(report.errors[0].node_path.to_string(), "/1/0/0");
    }

    #[test]
    fn test_static_name_spelling_an_iterated_identity_collides() {
        let report = resolve(
            "<view v-for=\"x in xs\"><slot/></view><slot name=\"d-0\"/>",
            PlatformFamily::Weixin,
        );
        assert_eq!(report.errors[0].code, ERR_SLOT_COLLISION);
        let unrelated = resolve(
            "<view v-for=\"x in xs\"><slot/></view><slot name=\"d-x\"/>",
            PlatformFamily::Weixin,
        );
        assert!(unrelated.errors.is_empty());
    }

    #[test]
    fn test_event_on_slot_is_rejected() {
        let report = resolve("<slot @tap=\"onTap\"/>", PlatformFamily::Web);
        assert_eq!(report.errors[0].code, ERR_SLOT_EVENT);
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // BINDING MAPPING
    // ═══════════════════════════════════════════════════════════════════════════

    #[test]
    fn test_static_markup_has_empty_mapping() {
        let context = bindings("<button><slot>Submit</slot></button>", PlatformFamily::Weixin);
        assert!(context.is_empty());
        assert_eq!(context.evaluate(&json!({})).unwrap(), json!({}));
    }

    #[test]
    fn test_nested_loop_outlets_evaluate_per_index() {
        let context = bindings(
            "<view v-for=\"row in rows\"><view v-for=\"col in row\"><slot/></view></view>",
            PlatformFamily::Weixin,
        );
        let value = context
            .evaluate(&json!({
                "rows": [[1, 2]],
                "$slots": { "d-0-0": true, "d-0-1": true }
            }))
            .unwrap();
        assert_eq!(
            value,
            json!({"a": [{"a": [
                {"a": "d-0-0", "b": {"name": "d-0-0", "props": null}},
                {"a": "d-0-1", "b": {"name": "d-0-1", "props": null}}
            ]}]})
        );
    }

    #[test]
    fn test_conditional_chain_evaluates_taken_branch() {
        let context = bindings(
            "<view v-if=\"ok\">A</view><view v-else>B</view>",
            PlatformFamily::Weixin,
        );
        assert_eq!(context.evaluate(&json!({"ok": true})).unwrap(), json!({"a": {"b": true}}));
        assert_eq!(context.evaluate(&json!({"ok": false})).unwrap(), json!({"a": {}}));
    }

    #[test]
    fn test_untaken_branch_is_never_evaluated() {
        let context = bindings("<view v-if=\"user\">{{user.name}}</view>", PlatformFamily::Weixin);
        assert_eq!(context.evaluate(&json!({"user": null})).unwrap(), json!({"a": {}}));
    }

    #[test]
    fn test_unknown_key_is_an_error() {
        let context = bindings("<text>{{msg}}</text>", PlatformFamily::Weixin);
        let wider = bindings("<text>{{a}}</text><text>{{b}}</text>", PlatformFamily::Weixin);
        let missing = &wider.root.entries[1].key;
        assert_eq!(missing.as_str(), "b");
        assert!(context.evaluate_key(missing, &json!({})).is_err());
    }

    #[test]
    fn test_function_family_keys_are_global() {
        let context = bindings(
            "<text>{{a}}</text><view v-for=\"x in xs\">{{x}}</view>",
            PlatformFamily::Web,
        );
        assert!(!context.scope_local_keys);
        assert_eq!(context.root.entries[0].key.to_string(), "a");
        assert_eq!(context.root.entries[1].key.to_string(), "b");
    }
}
