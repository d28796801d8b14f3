// ==========================================
// 设备维修管理 - 本地化文本
// ==========================================
// 范围: 审计日志描述 (写库时即按当前语言渲染) + CLI 生成汇总
// 语言: zh-CN (默认) / en, 资源文件见 locales/*.yml
// 宏初始化位于 lib.rs
// ==========================================

/// 支持的语言
pub const SUPPORTED_LOCALES: &[&str] = &["zh-CN", "en"];

pub fn current_locale() -> String {
    rust_i18n::locale().to_string()
}

/// 切换语言; 不支持的语言代码忽略并返回 false
pub fn set_locale(locale: &str) -> bool {
    if !SUPPORTED_LOCALES.contains(&locale) {
        tracing::warn!(locale = %locale, "不支持的语言, 保持 {}", current_locale());
        return false;
    }
    rust_i18n::set_locale(locale);
    true
}

/// 渲染带 `%{name}` 占位符的文本
///
/// 未提供的占位符保留原样, 便于在审计记录中发现遗漏的参数
///
/// ```no_run
/// use cmms_reliability::i18n::t_with_args;
/// let text = t_with_args("audit.work_order_closed", &[("code", "COR-000007")]);
/// ```
pub fn t_with_args(key: &str, args: &[(&str, &str)]) -> String {
    args.iter()
        .fold(rust_i18n::t!(key).to_string(), |text, (name, value)| {
            text.replace(&format!("%{{{}}}", name), value)
        })
}
