// JSON 树的路径读写，内存实现和 Redis 整块存储共用

use serde_json::{Map, Value};

/// null 与空对象都视为“不存在”
pub(crate) fn is_empty_node(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

pub(crate) fn value_at<'a>(node: &'a Value, segs: &[&str]) -> Option<&'a Value> {
    let mut current = node;
    for seg in segs {
        current = current.as_object()?.get(*seg)?;
    }
    (!is_empty_node(current)).then_some(current)
}

/// 写入并返回旧值；写入空值等同删除
pub(crate) fn set_at(node: &mut Value, segs: &[&str], value: Value) -> Option<Value> {
    if is_empty_node(&value) {
        return if segs.is_empty() {
            let previous = std::mem::replace(node, Value::Null);
            (!is_empty_node(&previous)).then_some(previous)
        } else {
            remove_at(node, segs)
        };
    }

    let Some((first, rest)) = segs.split_first() else {
        let previous = std::mem::replace(node, value);
        return (!is_empty_node(&previous)).then_some(previous);
    };

    if !node.is_object() {
        *node = Value::Object(Map::new());
    }
    let Value::Object(map) = node else {
        return None;
    };

    if rest.is_empty() {
        return map.insert(first.to_string(), value);
    }

    let child = map
        .entry(first.to_string())
        .or_insert_with(|| Value::Object(Map::new()));
    set_at(child, rest, value)
}

/// 删除并返回被删除的值，删除后变空的父节点一并清理
pub(crate) fn remove_at(node: &mut Value, segs: &[&str]) -> Option<Value> {
    let (first, rest) = segs.split_first()?;
    let map = node.as_object_mut()?;

    if rest.is_empty() {
        return map.remove(*first);
    }

    let child = map.get_mut(*first)?;
    let removed = remove_at(child, rest);
    if is_empty_node(child) {
        map.remove(*first);
    }
    removed
}

/// 直接子节点（按键排序）
pub(crate) fn children(node: Option<&Value>) -> Vec<(String, Value)> {
    match node {
        Some(Value::Object(map)) => map
            .iter()
            .filter(|(_, value)| !is_empty_node(value))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect(),
        _ => Vec::new(),
    }
}
