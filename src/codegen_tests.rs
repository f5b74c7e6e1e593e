//! End-to-end codegen tests: template source in, exact generated text out.

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use crate::compile::{compile, compile_many, compile_with_table};
    use crate::error::{
        CompileError, ERR_DIRECTIVE_CONFLICT, ERR_EMISSION_MODE, ERR_TARGET_UNSUPPORTED,
        ERR_UNSUPPORTED_DIRECTIVE,
    };
    use crate::options::{CompileOptions, EmissionMode, PlatformFamily};
    use crate::target::{CompileResult, NoopResolver, TableEntry};

    fn options(platform: PlatformFamily) -> CompileOptions {
        CompileOptions::for_platform(platform)
    }

    fn run(source: &str, platform: PlatformFamily) -> CompileResult {
        compile(source, &options(platform), &NoopResolver).unwrap()
    }

    fn code(source: &str, platform: PlatformFamily) -> String {
        run(source, platform).output.code().unwrap().to_string()
    }

    fn markup(source: &str, platform: PlatformFamily) -> String {
        run(source, platform).output.markup().unwrap().to_string()
    }

    fn codegen_error(result: Result<CompileResult, CompileError>) -> String {
        match result {
            Err(CompileError::Codegen(errors)) => errors[0].code.clone(),
            other => panic!("expected a codegen error, got {:?}", other),
        }
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // FUNCTION-CALL FAMILY
    // ═══════════════════════════════════════════════════════════════════════════

    #[test]
    fn test_single_element_has_no_props_argument() {
        assert_eq!(
            code("<view/>", PlatformFamily::Web),
            "import { createElementVNode } from \"vue\";\n\n\
             export function render(_ctx) {\n  return createElementVNode(\"view\")\n}\n"
        );
    }

    #[test]
    fn test_interpolation_sets_text_flag() {
        let result = run("<text>{{msg}}</text>", PlatformFamily::Web);
        assert_eq!(
            result.output.code().unwrap(),
            "import { createElementVNode } from \"vue\";\n\
             import { display as _d } from \"@dcloudio/uni-runtime\";\n\n\
             export function render(_ctx) {\n  \
             return createElementVNode(\"text\", null, _d(_ctx.msg), 1 /* TEXT */)\n}\n"
        );
        assert_eq!(result.helpers, vec!["display".to_string()]);
    }

    #[test]
    fn test_mixed_text_concatenates() {
        let out = code("<text>Hello {{name}}!</text>", PlatformFamily::Web);
        assert!(out.contains("createElementVNode(\"text\", null, \"Hello \" + _d(_ctx.name) + \"!\", 1 /* TEXT */)"));
    }

    #[test]
    fn test_empty_template_returns_null() {
        let out = code("", PlatformFamily::Web);
        assert_eq!(out, "export function render(_ctx) {\n  return null\n}\n");
    }

    #[test]
    fn test_multiple_roots_become_stable_fragment() {
        let out = code("<view/><text/>", PlatformFamily::Web);
        assert!(out.starts_with("import { Fragment, createElementVNode } from \"vue\";"));
        assert!(out.contains(
            "  return createElementVNode(Fragment, null, [\n    \
             createElementVNode(\"view\"),\n    \
             createElementVNode(\"text\")\n  ], 64 /* STABLE_FRAGMENT */)\n"
        ));
    }

    #[test]
    fn test_props_and_flags() {
        let source = "<view class=\"box\" :title=\"t\" :style=\"s\" disabled />";
        let out = code(source, PlatformFamily::Web);
        assert!(out.contains(
            "createElementVNode(\"view\", { class: \"box\", title: _ctx.t, style: _ctx.s, disabled: true }, null, 12 /* STYLE, PROPS */, [\"title\"])"
        ));
    }

    #[test]
    fn test_typed_props_use_map_literal() {
        let out = code("<view class=\"box\" :title=\"t\"/>", PlatformFamily::Android);
        assert!(out.contains(
            "createElementVNode(\"view\", new Map<string, any | null>([[\"class\", \"box\"], [\"title\", _ctx.t]]), null, 8 /* PROPS */, [\"title\"])"
        ));
        assert!(!out.contains("from \"vue\""));
    }

    #[test]
    fn test_typed_wrapper_signature() {
        let opts = CompileOptions {
            component_name: "Index".to_string(),
            ..options(PlatformFamily::Ios)
        };
        let result = compile("<view/>", &opts, &NoopResolver).unwrap();
        assert_eq!(
            result.output.code().unwrap(),
            "@Suppress(\"UNUSED_PARAMETER\") function IndexRender(_ctx: Index): VNode | null {\n  \
             return createElementVNode(\"view\")\n}\n"
        );
    }

    #[test]
    fn test_event_handlers() {
        let source = "<view @tap=\"onTap\" @long-press=\"select($event)\"/>";
        let out = code(source, PlatformFamily::Web);
        assert!(out.contains(
            "{ onTap: _ctx.onTap, onLongPress: $event => (_ctx.select($event)) }"
        ));
    }

    #[test]
    fn test_conditional_without_else_uses_comment() {
        let out = code("<view v-if=\"ok\">A</view>", PlatformFamily::Web);
        assert!(out.contains(
            "return _ctx.ok ? createElementVNode(\"view\", null, \"A\") : createCommentVNode(\"v-if\", true)"
        ));
        assert!(out.starts_with("import { createCommentVNode, createElementVNode } from \"vue\";"));
    }

    #[test]
    fn test_conditional_chain_parenthesizes_conditions() {
        let out = code(
            "<view v-if=\"n > 1\">A</view><view v-else-if=\"ok\">B</view><view v-else>C</view>",
            PlatformFamily::Web,
        );
        assert!(out.contains(
            "return (_ctx.n > 1) ? createElementVNode(\"view\", null, \"A\") : _ctx.ok ? createElementVNode(\"view\", null, \"B\") : createElementVNode(\"view\", null, \"C\")"
        ));
    }

    #[test]
    fn test_keyed_loop() {
        let result = run(
            "<view v-for=\"(item, index) in list\" :key=\"item.id\">{{item.name}}</view>",
            PlatformFamily::Web,
        );
        let out = result.output.code().unwrap();
        assert!(out.contains(
            "return createElementVNode(Fragment, null, _f(_ctx.list, (item, index, i0) => createElementVNode(\"view\", { key: item.id }, _d(item.name), 1 /* TEXT */)), 128 /* KEYED_FRAGMENT */)"
        ));
        assert!(out.contains("import { display as _d, forEach as _f } from \"@dcloudio/uni-runtime\";"));
        assert_eq!(result.helpers, vec!["display".to_string(), "forEach".to_string()]);
    }

    #[test]
    fn test_unkeyed_loop_without_index() {
        let out = code("<text v-for=\"row in rows\">x</text>", PlatformFamily::Web);
        assert!(out.contains("_f(_ctx.rows, (row, _, i0) => createElementVNode(\"text\", null, \"x\")), 256 /* UNKEYED_FRAGMENT */)"));
    }

    #[test]
    fn test_slot_fallback_is_inlined() {
        let out = code(
            "<view><slot name=\"header\" :title=\"t\">Default</slot></view>",
            PlatformFamily::Web,
        );
        assert!(out.contains(
            "  return createElementVNode(\"view\", null, [\n    \
             _r(\"header\", { title: _ctx.t }, null) ?? createTextVNode(\"Default\")\n  ])\n"
        ));
    }

    #[test]
    fn test_slot_in_loop_passes_index_path() {
        let out = code("<view v-for=\"item in list\"><slot/></view>", PlatformFamily::Web);
        assert!(out.contains("_r(\"default\", null, i0)"));
    }

    #[test]
    fn test_slot_with_several_fallback_nodes() {
        let out = code("<slot><text>a</text><text>b</text></slot>", PlatformFamily::Web);
        assert!(out.contains(
            "return _r(\"default\", null, null) ?? createElementVNode(Fragment, null, [\n    \
             createElementVNode(\"text\", null, \"a\"),\n    \
             createElementVNode(\"text\", null, \"b\")\n  ], 64 /* STABLE_FRAGMENT */)"
        ));
    }

    #[test]
    fn test_hoisted_static_subtree() {
        let opts = CompileOptions {
            hoist_static: true,
            ..options(PlatformFamily::Web)
        };
        let result = compile("<view><text>hi</text></view>", &opts, &NoopResolver).unwrap();
        assert_eq!(
            result.output.code().unwrap(),
            "import { createElementVNode } from \"vue\";\n\n\
             const _hoisted_1 = createElementVNode(\"text\", null, \"hi\", -1 /* HOISTED */)\n\n\
             export function render(_ctx) {\n  \
             return createElementVNode(\"view\", null, [\n    _hoisted_1\n  ])\n}\n"
        );
    }

    #[test]
    fn test_local_component_on_typed_target() {
        let mut components = BTreeMap::new();
        components.insert(
            "uni-icons".to_string(),
            TableEntry::Local {
                path: "@/components/uni-icons/uni-icons.uvue".to_string(),
            },
        );
        let opts = CompileOptions {
            component_name: "Index".to_string(),
            components,
            ..options(PlatformFamily::Android)
        };
        let result = compile_with_table("<view><uni-icons type=\"star\"/></view>", &opts).unwrap();
        assert_eq!(
            result.output.code().unwrap(),
            "import _easycom_uni_icons from '@/components/uni-icons/uni-icons.uvue'\n\n\
             @Suppress(\"UNUSED_PARAMETER\") function IndexRender(_ctx: Index): VNode | null {\n  \
             const _component_uni_icons = resolveEasyComponent(\"uni-icons\",_easycom_uni_icons)\n\n  \
             return createElementVNode(\"view\", null, [\n    \
             createVNode(_component_uni_icons, new Map<string, any | null>([[\"type\", \"star\"]]))\n  ])\n}\n"
        );
    }

    #[test]
    fn test_unresolved_component_uses_runtime_lookup() {
        let out = code("<my-card>hi</my-card>", PlatformFamily::Web);
        assert!(out.contains("const _component_my_card = resolveComponent(\"my-card\")"));
        assert!(out.contains(
            "return createVNode(_component_my_card, null, { default: () => [\n    createTextVNode(\"hi\")\n  ] })"
        ));
    }

    #[test]
    fn test_v_html_becomes_inner_html() {
        let out = code("<view v-html=\"raw\"/>", PlatformFamily::Web);
        assert!(out.contains("createElementVNode(\"view\", { innerHTML: _ctx.raw }, null, 8 /* PROPS */, [\"innerHTML\"])"));
    }

    #[test]
    fn test_template_wrapper_becomes_fragment() {
        let out = code("<template v-if=\"ok\"><text>a</text></template>", PlatformFamily::Web);
        assert!(out.starts_with(
            "import { Fragment, createCommentVNode, createElementVNode } from \"vue\";"
        ));
        assert!(out.contains(
            "  return _ctx.ok ? createElementVNode(Fragment, null, [\n    \
             createElementVNode(\"text\", null, \"a\")\n  ], 64 /* STABLE_FRAGMENT */) \
             : createCommentVNode(\"v-if\", true)\n"
        ));
        assert!(!out.contains("resolveComponent"));
    }

    #[test]
    fn test_v_html_with_children_conflicts() {
        let opts = options(PlatformFamily::Web);
        let result = compile("<view v-html=\"raw\">x</view>", &opts, &NoopResolver);
        assert_eq!(codegen_error(result), ERR_DIRECTIVE_CONFLICT);
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // MARKUP FAMILY
    // ═══════════════════════════════════════════════════════════════════════════

    #[test]
    fn test_static_slot_fallback_uses_dual_branch() {
        let result = run("<button><slot>Submit</slot></button>", PlatformFamily::Weixin);
        assert_eq!(
            result.output.markup().unwrap(),
            "<button><block wx:if=\"{{$slots.d}}\"><slot/></block><block wx:else>Submit</block></button>"
        );
        assert_eq!(
            result.output.binding_function_source().unwrap(),
            "export default function bindings(_ctx) {\n  return {};\n}\n"
        );
        assert!(result.helpers.is_empty());
    }

    #[test]
    fn test_markup_attributes_and_interpolation() {
        assert_eq!(
            markup(
                "<view class=\"row\" :title=\"t\"><text>{{msg}}</text></view>",
                PlatformFamily::Weixin
            ),
            "<view class=\"row\" title=\"{{a}}\"><text>{{b}}</text></view>"
        );
    }

    #[test]
    fn test_markup_conditionals_reference_group_record() {
        assert_eq!(
            markup("<view v-if=\"ok\">A</view><view v-else>B</view>", PlatformFamily::Weixin),
            "<view wx:if=\"{{a.b}}\">A</view><view wx:else>B</view>"
        );
        assert_eq!(
            markup(
                "<view v-if=\"ok\">A</view><view v-else-if=\"maybe\">B</view>",
                PlatformFamily::Alipay
            ),
            "<view a:if=\"{{a.b}}\">A</view><view a:elif=\"{{a.c}}\">B</view>"
        );
    }

    #[test]
    fn test_markup_loop_restarts_keys() {
        let result = run(
            "<view v-for=\"item in list\" :key=\"item.id\">{{item.name}}</view>",
            PlatformFamily::Weixin,
        );
        assert_eq!(
            result.output.markup().unwrap(),
            "<view wx:for=\"{{a}}\" wx:for-item=\"item\" wx:key=\"a\">{{item.b}}</view>"
        );
        assert_eq!(
            result.output.binding_function_source().unwrap(),
            "import { display as _d, forEach as _f } from \"@dcloudio/uni-runtime\";\n\
             export default function bindings(_ctx) {\n  return {\n    \
             a: _f(_ctx.list, (item, _, i0) => {\n      return {\n        \
             a: item.id,\n        b: _d(item.name)\n      };\n    })\n  };\n}\n"
        );
    }

    #[test]
    fn test_conditional_loop_gets_block() {
        assert_eq!(
            markup("<view v-if=\"ok\" v-for=\"item in list\">x</view>", PlatformFamily::Weixin),
            "<block wx:if=\"{{a.b}}\"><view wx:for=\"{{a.c}}\" wx:for-item=\"item\">x</view></block>"
        );
    }

    #[test]
    fn test_nested_loop_slot_markup() {
        let result = run(
            "<view v-for=\"row in rows\"><view v-for=\"col in row\"><slot/></view></view>",
            PlatformFamily::Weixin,
        );
        assert_eq!(
            result.output.markup().unwrap(),
            "<view wx:for=\"{{a}}\" wx:for-item=\"row\"><view wx:for=\"{{row.a}}\" wx:for-item=\"col\"><slot name=\"{{col.a}}\"/></view></view>"
        );
        assert!(result
            .output
            .binding_function_source()
            .unwrap()
            .contains("            a: \"d-\" + i0 + \"-\" + i1,\n            b: _r(\"d\", null, i0 + \"-\" + i1)\n"));
    }

    #[test]
    fn test_iterated_slot_fallback_checks_outlet_entry() {
        assert_eq!(
            markup("<view v-for=\"item in list\"><slot>none</slot></view>", PlatformFamily::Weixin),
            "<view wx:for=\"{{a}}\" wx:for-item=\"item\"><block wx:if=\"{{item.b}}\"><slot name=\"{{item.a}}\"/></block><block wx:else>none</block></view>"
        );
    }

    #[test]
    fn test_dynamic_slot_name() {
        assert_eq!(
            markup("<slot :name=\"n\"/>", PlatformFamily::Weixin),
            "<slot name=\"{{a}}\"/>"
        );
        assert_eq!(
            markup("<slot name=\"header\"/>", PlatformFamily::Weixin),
            "<slot name=\"header\"/>"
        );
    }

    #[test]
    fn test_markup_events() {
        assert_eq!(
            markup("<button @tap=\"submit\">Go</button>", PlatformFamily::Weixin),
            "<button bindtap=\"submit\">Go</button>"
        );
        assert_eq!(
            markup("<button @tap=\"submit\">Go</button>", PlatformFamily::Alipay),
            "<button onTap=\"submit\">Go</button>"
        );
        let inline = compile(
            "<button @tap=\"count + 1\">Go</button>",
            &options(PlatformFamily::Weixin),
            &NoopResolver,
        );
        assert_eq!(codegen_error(inline), ERR_TARGET_UNSUPPORTED);
    }

    #[test]
    fn test_markup_rejects_v_html() {
        let opts = options(PlatformFamily::Weixin);
        let result = compile("<view v-html=\"raw\"/>", &opts, &NoopResolver);
        assert_eq!(codegen_error(result), ERR_TARGET_UNSUPPORTED);
    }

    #[test]
    fn test_template_wrapper_becomes_block() {
        assert_eq!(
            markup("<template v-if=\"ok\"><text>a</text></template>", PlatformFamily::Weixin),
            "<block wx:if=\"{{a.b}}\"><text>a</text></block>"
        );
        assert_eq!(
            markup(
                "<template v-for=\"item in list\"><text>{{item.n}}</text></template>",
                PlatformFamily::Alipay
            ),
            "<block a:for=\"{{a}}\" a:for-item=\"item\"><text>{{item.a}}</text></block>"
        );
    }

    #[test]
    fn test_key_outside_loop_is_kept_as_attribute() {
        let result = run("<view :key=\"id\">a</view>", PlatformFamily::Weixin);
        assert_eq!(result.output.markup().unwrap(), "<view key=\"{{a}}\">a</view>");
        assert!(result.errors.is_empty());
        assert!(result.output.binding_function_source().unwrap().contains("a: _ctx.id"));
    }

    #[test]
    fn test_component_with_content_lists_provided_outlets() {
        assert_eq!(
            markup(
                "<view><custom><slot><view>fallback</view></slot></custom></view>",
                PlatformFamily::Weixin
            ),
            "<view><custom u-s=\"{{['d']}}\"><block wx:if=\"{{$slots.d}}\"><slot/></block>\
             <block wx:else><view>fallback</view></block></custom></view>"
        );
        assert_eq!(markup("<custom/>", PlatformFamily::Weixin), "<custom/>");
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // ERRORS & DETERMINISM
    // ═══════════════════════════════════════════════════════════════════════════

    #[test]
    fn test_unknown_directive_is_rejected() {
        let err = compile("<view v-model=\"x\"/>", &options(PlatformFamily::Web), &NoopResolver)
            .unwrap_err();
        match err {
            CompileError::Codegen(errors) => {
                assert_eq!(errors[0].code, ERR_UNSUPPORTED_DIRECTIVE);
                assert_eq!(errors[0].node_path.to_string(), "/0");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_partial_output_collects_errors() {
        let opts = CompileOptions {
            partial_output: true,
            ..options(PlatformFamily::Web)
        };
        let source = "<view><view v-model=\"x\"/><text/></view>";
        let result = compile(source, &opts, &NoopResolver).unwrap();
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].node_path.to_string(), "/0/0");
        assert!(result.output.code().unwrap().contains(
            "createElementVNode(\"view\", null, [\n    createElementVNode(\"text\")\n  ])"
        ));
    }

    #[test]
    fn test_emission_mode_mismatch_is_error() {
        let opts = CompileOptions {
            emission_mode: EmissionMode::StandalonePair,
            ..options(PlatformFamily::Web)
        };
        assert_eq!(codegen_error(compile("<view/>", &opts, &NoopResolver)), ERR_EMISSION_MODE);
    }

    #[test]
    fn test_parse_error_aborts() {
        let err = compile("<view>", &options(PlatformFamily::Web), &NoopResolver).unwrap_err();
        assert!(matches!(err, CompileError::Parse(_)));
    }

    #[test]
    fn test_output_is_deterministic() {
        let source = "<view v-for=\"item in list\"><text v-if=\"item.ok\">{{item.a}}</text><slot v-else :name=\"item.n\">x</slot></view>";
        for platform in [PlatformFamily::Web, PlatformFamily::Android, PlatformFamily::Weixin] {
            assert_eq!(run(source, platform), run(source, platform));
        }
    }

    #[test]
    fn test_compile_many_keeps_order() {
        let results = compile_many(
            &["<view/>", "<text/>", "<view>"],
            &options(PlatformFamily::Web),
            &NoopResolver,
        );
        assert_eq!(results.len(), 3);
        assert!(results[0].as_ref().unwrap().output.code().unwrap().contains("\"view\""));
        assert!(results[1].as_ref().unwrap().output.code().unwrap().contains("\"text\""));
        assert!(results[2].is_err());
    }
}
