//! 贝塞尔缓动曲线

use crate::config::DeformConfig;

/// 三次贝塞尔缓动曲线
///
/// 端点固定为 (0,0) 与 (1,1)，控制点为 (x1,y1)、(x2,y2)。
/// 给定 x 时用二分法求曲线参数 s，再返回 y(s)。
#[derive(Clone, Debug, PartialEq)]
pub struct BezierCurve {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
    /// 二分法最大迭代次数
    pub iterations: u32,
    /// 二分法容差
    pub tolerance: f32,
}

impl Default for BezierCurve {
    fn default() -> Self {
        Self::ease()
    }
}

impl BezierCurve {
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self {
            x1,
            y1,
            x2,
            y2,
            iterations: 20,
            tolerance: 1e-6,
        }
    }

    /// 时间扭曲使用的缓入缓出曲线
    pub fn ease() -> Self {
        Self::new(0.05, 0.0, 0.95, 1.0)
    }

    /// 线性插值
    pub fn linear() -> Self {
        Self::new(0.25, 0.25, 0.75, 0.75)
    }

    /// 从配置创建
    pub fn from_config(config: &DeformConfig) -> Self {
        Self {
            x1: config.bezier_x1,
            y1: config.bezier_y1,
            x2: config.bezier_x2,
            y2: config.bezier_y2,
            iterations: config.bisection_iterations,
            tolerance: config.bisection_tolerance,
        }
    }

    /// 评估贝塞尔曲线
    pub fn evaluate(&self, x: f32) -> f32 {
        if x <= 0.0 {
            return 0.0;
        }
        if x >= 1.0 {
            return 1.0;
        }

        // x(s) 在控制点 x 位于 [0,1] 时单调，二分法求 x(s) = x
        let mut low = 0.0_f32;
        let mut high = 1.0_f32;
        let mut s = x;
        for _ in 0..self.iterations.max(1) {
            s = 0.5 * (low + high);
            let diff = self.bezier_x(s) - x;
            if diff.abs() < self.tolerance {
                break;
            }
            if diff < 0.0 {
                low = s;
            } else {
                high = s;
            }
        }

        self.bezier_y(s)
    }

    fn bezier_x(&self, s: f32) -> f32 {
        cubic(self.x1, self.x2, s)
    }

    fn bezier_y(&self, s: f32) -> f32 {
        cubic(self.y1, self.y2, s)
    }
}

/// 端点为 0 与 1 的三次贝塞尔分量
fn cubic(p1: f32, p2: f32, s: f32) -> f32 {
    let s2 = s * s;
    let s3 = s2 * s;
    let t = 1.0 - s;
    let t2 = t * t;

    3.0 * t2 * s * p1 + 3.0 * t * s2 * p2 + s3
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_points() {
        let curve = BezierCurve::ease();
        assert_eq!(curve.evaluate(0.0), 0.0);
        assert_eq!(curve.evaluate(1.0), 1.0);
        assert_eq!(curve.evaluate(-0.5), 0.0);
        assert_eq!(curve.evaluate(1.5), 1.0);
    }

    #[test]
    fn test_ease_is_symmetric_and_monotone() {
        let curve = BezierCurve::ease();
        assert!((curve.evaluate(0.5) - 0.5).abs() < 1e-3);

        let mut previous = 0.0;
        for i in 1..100 {
            let y = curve.evaluate(i as f32 / 100.0);
            assert!(y >= previous - 1e-5);
            previous = y;
        }
        // 缓入：前段慢于线性
        assert!(curve.evaluate(0.2) < 0.2);
        assert!(curve.evaluate(0.8) > 0.8);
    }

    #[test]
    fn test_linear_curve_is_identity() {
        let curve = BezierCurve::linear();
        for x in [0.1, 0.3, 0.7, 0.9] {
            assert!((curve.evaluate(x) - x).abs() < 1e-4);
        }
    }

    #[test]
    fn test_from_config_matches_ease() {
        let curve = BezierCurve::from_config(&DeformConfig::default());
        assert_eq!(curve, BezierCurve::ease());
    }
}
