//! 联系人分块与实例轮转分配
//!
//! 联系人按输入顺序切成每块 `block_size` 个（默认 800），
//! 第 k 块分配给 `instances[k % M]`。

use crate::admin::campaign::models::SendRow;
use crate::admin::ingest::Contact;
use crate::admin::instance::Instance;
use anyhow::{anyhow, Result};
use serde::Serialize;

/// 每个实例一次分到的联系人数
pub const DEFAULT_BLOCK_SIZE: usize = 800;

/// 写入 Disparador 时每批行数
pub const DEFAULT_INSERT_BATCH_SIZE: usize = 50;

/// 一个联系人块的分配结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BlockAssignment {
    pub index: usize,
    pub instancia: String,
    /// 块在联系人列表中的起始位置
    pub start: usize,
    pub len: usize,
}

/// 计算分块方案：共 `ceil(total / block_size)` 块
pub fn plan_fanout(
    total: usize,
    instances: &[Instance],
    block_size: usize,
) -> Result<Vec<BlockAssignment>> {
    if block_size == 0 {
        return Err(anyhow!("分块大小必须大于 0"));
    }
    if instances.is_empty() {
        return Err(anyhow!("没有可用的发送实例"));
    }

    let plan = (0..total)
        .step_by(block_size)
        .enumerate()
        .map(|(index, start)| BlockAssignment {
            index,
            instancia: instances[index % instances.len()].instancia.clone(),
            start,
            len: block_size.min(total - start),
        })
        .collect();
    Ok(plan)
}

/// 按分块方案生成发送行，顺序与联系人顺序一致
pub fn build_send_rows(
    campaign_id: &str,
    contacts: &[Contact],
    plan: &[BlockAssignment],
) -> Vec<SendRow> {
    plan.iter()
        .flat_map(|block| {
            contacts
                .iter()
                .skip(block.start)
                .take(block.len)
                .map(move |c| SendRow {
                    id: None,
                    campanha_id: campaign_id.to_string(),
                    nome: c.nome.clone(),
                    whatsapp: c.whatsapp.clone(),
                    cpf: c.cpf.clone(),
                    instancia: block.instancia.clone(),
                    enviado: false,
                    created_at: None,
                })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn instances(names: &[&str]) -> Vec<Instance> {
        names
            .iter()
            .enumerate()
            .map(|(i, n)| {
                let mut inst = Instance::fallback(n);
                inst.id = i as i64 + 1;
                inst
            })
            .collect()
    }

    fn contacts(n: usize) -> Vec<Contact> {
        (0..n)
            .map(|i| Contact {
                nome: format!("Contato {}", i + 1),
                whatsapp: format!("55119{:08}", i),
                cpf: "-".to_string(),
            })
            .collect()
    }

    #[test]
    fn sixteen_hundred_and_one_contacts_over_two_instances() {
        let plan = plan_fanout(1601, &instances(&["inst0", "inst1"]), DEFAULT_BLOCK_SIZE).unwrap();
        let shape: Vec<(usize, &str)> = plan.iter().map(|b| (b.len, b.instancia.as_str())).collect();
        assert_eq!(shape, vec![(800, "inst0"), (800, "inst1"), (1, "inst0")]);
        assert_eq!(plan[2].start, 1600);
    }

    #[test]
    fn block_count_is_ceiling_and_covers_every_contact() {
        let insts = instances(&["a", "b", "c"]);
        for total in [0usize, 1, 799, 800, 801, 2400, 2401] {
            let plan = plan_fanout(total, &insts, DEFAULT_BLOCK_SIZE).unwrap();
            assert_eq!(plan.len(), total.div_ceil(DEFAULT_BLOCK_SIZE));
            assert_eq!(plan.iter().map(|b| b.len).sum::<usize>(), total);
            for b in &plan {
                assert_eq!(b.instancia, insts[b.index % 3].instancia);
            }
        }
    }

    #[test]
    fn rejects_missing_instances_and_zero_block_size() {
        assert!(plan_fanout(10, &[], DEFAULT_BLOCK_SIZE).is_err());
        assert!(plan_fanout(10, &instances(&["a"]), 0).is_err());
    }

    #[test]
    fn send_rows_follow_input_order() {
        let list = contacts(5);
        let plan = plan_fanout(list.len(), &instances(&["a", "b"]), 2).unwrap();
        let rows = build_send_rows("camp-1", &list, &plan);

        assert_eq!(rows.len(), 5);
        let owners: Vec<&str> = rows.iter().map(|r| r.instancia.as_str()).collect();
        assert_eq!(owners, vec!["a", "a", "b", "b", "a"]);
        for (row, contact) in rows.iter().zip(&list) {
            assert_eq!(row.whatsapp, contact.whatsapp);
            assert_eq!(row.campanha_id, "camp-1");
            assert!(!row.enviado);
        }
    }
}
