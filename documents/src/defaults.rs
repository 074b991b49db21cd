//! Built-in documents served when neither the store nor the files have one.

use crate::document::{ContextDocument, ToolsPromptDocument};
use serde_json::{Map, json};
use std::sync::LazyLock;

pub(crate) static DEFAULT_CONTEXT: LazyLock<ContextDocument> = LazyLock::new(|| ContextDocument {
    system: "你是一个专业的助手，下面是本次报告的内容，需要报告内容来回答问题。".into(),
    context: json!({
        "report_metadata": {
            "title": "空间转录组深度分析报告",
            "project_name": "report中增加ai助手测试项目",
            "sample_info": {
                "sample_id": "LUAD_S1, LUAD_S2",
                "slide_id": "LUAD_S1, LUAD_S2",
                "species": "hs",
                "tissue_type": "肺部"
            },
            "analysis_date": "2025-11-17",
            "pipeline_version": "深度分析"
        },
        "analysis_modules": {
            "1_0_loadData": {
                "module_name": "数据加载",
                "description": "原始数据加载和格式转换",
                "output_summary": "加载了278328个细胞，6738个基因",
                "key_metrics": {
                    "total_cells": 278328,
                    "total_genes": 6738
                }
            },
            "1_1_qcData": {
                "module_name": "质量控制",
                "description": "数据质量评估和过滤",
                "output_summary": "过滤后剩余278328个细胞，6738个基因",
                "key_metrics": {
                    "filtered_cells": 0,
                    "filtered_genes": 0,
                    "mito_ratio_threshold": 0,
                    "doublet_score_threshold": 0
                }
            },
            "1_2_preprocessData": {
                "module_name": "数据预处理",
                "description": "标准化、归一化、批次校正",
                "output_summary": "完成标准化和批次校正",
                "key_metrics": {
                    "normalization_method": "LogNormalize",
                    "nFeatures": 3000
                }
            },
            "1_3_pcaData": {
                "module_name": "PCA分析",
                "description": "主成分分析",
                "output_summary": "完成了PCA主成分分析",
                "key_metrics": {
                    "n_pcs": 40
                }
            },
            "1_4_integrateData": {
                "module_name": "数据整合",
                "description": "多样本/多区域数据整合",
                "output_summary": "完成数据整合，识别批次效应",
                "key_metrics": {
                    "integration_method": "Harmony",
                    "dim_use": 30,
                    "k.weight": 50
                }
            },
            "1_5_clusterReductionData": {
                "module_name": "聚类降维",
                "description": "降维聚类分析",
                "output_summary": "识别15个细胞群",
                "key_metrics": {
                    "n_clusters": 12,
                    "FindClusters_resolution": 0.2,
                    "n.neighbors": 30
                }
            },
            "2_1_labelTransfer": {
                "module_name": "细胞类型注释",
                "description": "基于参考数据集的细胞类型注释",
                "output_summary": "注释了40个细胞群的类型",
                "key_metrics": {
                    "reference_dataset": "GSE131907_Lung_Cancer_final_tLung",
                    "sc_downSample_num": 100
                },
                "annotation_results": {
                    "cluster_0": {"type": "Fibroblasts", "confidence": 0.92},
                    "cluster_1": {"type": "Endothelial cells", "confidence": 0.88}
                }
            },
            "2_2_stRCTD": {
                "module_name": "空间解卷积",
                "description": "空间表达数据的细胞类型解卷积",
                "output_summary": "注释了36个细胞群的类型",
                "key_metrics": {
                    "doublet_mode": "doublet"
                }
            },
            "3_1_BuildNicheAssay": {
                "module_name": "生态位分析",
                "description": "构建生态位并分析细胞相互作用",
                "output_summary": "构建了4个生态位",
                "key_metrics": {
                    "neighbors.k": 20
                }
            },
            "3_2_CellChat2": {
                "module_name": "细胞通讯分析",
                "description": "分析细胞间的通讯网络",
                "output_summary": "识别了111个显著的细胞通讯对",
                "key_metrics": {
                    "signaling_pairs": 120
                }
            }
        }
    }),
    instructions: "回答问题时必须严格遵守以下规则：\n\
1. 必须基于上述报告内容回答问题，对于超出报告范围的问题要明确告知用户\n\
2. 【格式要求-必须遵守】回答必须使用纯文本格式，严禁使用任何Markdown语法，包括但不限于：**加粗**、*斜体*、# 标题、- 列表符号、1. 数字列表、``` 代码块、> 引用、[链接]() 等\n\
3. 使用普通的换行和空格来组织内容结构\n\
4. 回答要简洁准确，直接针对用户的问题"
        .into(),
    extra: Map::new(),
});

pub(crate) static DEFAULT_TOOLS_PROMPT: LazyLock<ToolsPromptDocument> =
    LazyLock::new(|| ToolsPromptDocument {
        tools_system_prompt: "你是一个专业的生物信息学分析助手。以下是平台支持的所有分析模块，当用户的报告中缺少某些分析，或用户提出的问题涉及未进行的分析时，你可以根据用户需求推荐合适的分析模块。".into(),
        recommendation_instructions: "推荐分析时请遵循以下原则：\n\
1. 根据用户的研究目的和数据类型推荐最相关的分析\n\
2. 简要说明推荐该分析的理由和预期收获\n\
3. 如果多个分析模块相关，按优先级排序推荐\n\
4. 对于已完成的分析，不要重复推荐"
            .into(),
        tools_data: json!({}),
        extra: Map::new(),
    });
