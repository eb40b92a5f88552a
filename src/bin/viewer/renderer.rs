/// 渲染器 (Renderer)
/// 实时画面 + IMU文本 + LED控制面板
use camlink_rs::protocol::LedTarget;
use camlink_rs::{ControlMessage, DisplayBuffer, LatestTelemetry, LinkConfig, TelemetryEvent};
use crossbeam_channel::{Receiver, Sender};
use egui_macroquad::egui;
use macroquad::prelude::*;
use std::time::Instant;

pub struct Renderer {
    telemetry_rx: Receiver<TelemetryEvent>,
    control_tx: Sender<ControlMessage>,
    latest: LatestTelemetry,
    buffer: DisplayBuffer,
    last_frame: Option<Texture2D>,
    rejected_frames: u64,

    render_count: u64,
    render_last: Instant,
    render_fps: f64,
    show_control_panel: bool,

    // 设备信息
    device_label: String,
    snapshot_dir: String,
    last_snapshot: Option<String>,

    // LED控制
    led_target_index: usize,
    led_color: [f32; 3],
}

impl Renderer {
    pub fn new(
        telemetry_rx: Receiver<TelemetryEvent>,
        control_tx: Sender<ControlMessage>,
        config: &LinkConfig,
    ) -> Self {
        tracing::info!("🎨 渲染器启动");
        Self {
            telemetry_rx,
            control_tx,
            latest: LatestTelemetry::default(),
            buffer: DisplayBuffer::new(
                config.display_width,
                config.display_height,
                config.dimension_policy,
            ),
            last_frame: None,
            rejected_frames: 0,
            render_count: 0,
            render_last: Instant::now(),
            render_fps: 0.0,
            show_control_panel: true,
            device_label: format!("{}:{}", config.host, config.port),
            snapshot_dir: config.snapshot_dir.clone(),
            last_snapshot: None,
            led_target_index: LedTarget::choices().len() - 1,
            led_color: [1.0, 1.0, 1.0],
        }
    }

    pub fn update(&mut self) {
        // 只保留最新一帧
        if !self.latest.drain(&self.telemetry_rx) {
            return;
        }
        let Some(frame) = &self.latest.frame else {
            return;
        };

        // 纹理每边只能是u16, 超出的帧与尺寸不符的帧一样丢弃
        let accepted = frame
            .texture_size()
            .and_then(|size| self.buffer.apply(frame).map(|()| size));
        let (w, h) = match accepted {
            Ok(size) => size,
            Err(e) => {
                self.rejected_frames += 1;
                if self.rejected_frames <= 10 {
                    tracing::warn!("⚠️ 丢弃帧: {}", e);
                }
                return;
            }
        };

        let bytes = self.buffer.to_rgba8();
        // 只在分辨率变化时重建纹理，否则更新像素数据
        let needs_rebuild = match &self.last_frame {
            Some(tex) => tex.width() != w as f32 || tex.height() != h as f32,
            None => true,
        };

        if needs_rebuild {
            let texture = Texture2D::from_rgba8(w, h, &bytes);
            texture.set_filter(FilterMode::Linear);
            self.last_frame = Some(texture);
        } else if let Some(tex) = &self.last_frame {
            tex.update(&Image {
                bytes,
                width: w,
                height: h,
            });
        }
    }

    pub fn draw(&mut self) {
        clear_background(BLACK);

        // 等比缩放居中
        if let Some(texture) = &self.last_frame {
            let scale = (screen_width() / texture.width()).min(screen_height() / texture.height());
            let w = texture.width() * scale;
            let h = texture.height() * scale;
            draw_texture_ex(
                texture,
                (screen_width() - w) / 2.0,
                (screen_height() - h) / 2.0,
                WHITE,
                DrawTextureParams {
                    dest_size: Some(vec2(w, h)),
                    ..Default::default()
                },
            );
        } else {
            draw_text(
                &format!("等待 {} 的画面...", self.device_label),
                20.0,
                screen_height() / 2.0,
                24.0,
                GRAY,
            );
        }

        let imu = self.latest.sensor.as_deref().unwrap_or("--");
        draw_text(
            &format!("IMU: {}", imu),
            10.0,
            screen_height() - 34.0,
            22.0,
            GREEN,
        );
        draw_text(
            &format!("FPS: {:.2}", self.latest.fps),
            10.0,
            screen_height() - 10.0,
            22.0,
            WHITE,
        );

        // 渲染FPS统计
        self.render_count += 1;
        let elapsed = self.render_last.elapsed().as_secs_f64();
        if elapsed >= 1.0 {
            self.render_fps = self.render_count as f64 / elapsed;
            self.render_count = 0;
            self.render_last = Instant::now();
        }
    }

    pub fn draw_egui(&mut self) {
        egui_macroquad::ui(|egui_ctx| {
            if !self.show_control_panel {
                return;
            }
            egui::Window::new("控制面板")
                .default_pos(egui::pos2(10.0, 10.0))
                .resizable(true)
                .show(egui_ctx, |ui| {
                    egui::CollapsingHeader::new("📊 状态")
                        .default_open(true)
                        .show(ui, |ui| {
                            ui.label(format!("设备: {}", self.device_label));
                            ui.horizontal(|ui| {
                                ui.label("接收 FPS:");
                                ui.colored_label(
                                    egui::Color32::GREEN,
                                    format!("{:.2}", self.latest.fps),
                                );
                            });
                            ui.label(format!("渲染 FPS: {:.1}", self.render_fps));
                            let (w, h) = self.buffer.dimensions();
                            ui.label(format!("画面: {}x{}", w, h));
                            if self.rejected_frames > 0 {
                                ui.colored_label(
                                    egui::Color32::YELLOW,
                                    format!("丢弃帧: {}", self.rejected_frames),
                                );
                            }
                        });

                    egui::CollapsingHeader::new("💡 LED")
                        .default_open(true)
                        .show(ui, |ui| {
                            let choices = LedTarget::choices();
                            egui::ComboBox::from_label("目标")
                                .selected_text(choices[self.led_target_index].to_string())
                                .show_ui(ui, |ui| {
                                    for (i, target) in choices.iter().enumerate() {
                                        ui.selectable_value(
                                            &mut self.led_target_index,
                                            i,
                                            target.to_string(),
                                        );
                                    }
                                });
                            ui.horizontal(|ui| {
                                ui.label("颜色:");
                                ui.color_edit_button_rgb(&mut self.led_color);
                            });
                            if ui.button("发送").clicked() {
                                self.send_led();
                            }
                        });

                    ui.separator();
                    if ui.button("💾 保存快照 (S)").clicked() {
                        self.save_snapshot();
                    }
                    if let Some(path) = &self.last_snapshot {
                        ui.label(format!("已保存: {}", path));
                    }
                });
        });

        egui_macroquad::draw();
    }

    pub fn handle_input(&mut self) {
        if is_key_pressed(KeyCode::Tab) {
            self.show_control_panel = !self.show_control_panel;
        }
        if is_key_pressed(KeyCode::S) {
            self.save_snapshot();
        }
    }

    fn send_led(&self) {
        let target = LedTarget::choices()[self.led_target_index];
        let msg = ControlMessage::SetLedUnit {
            target,
            rgb: self.led_color,
        };
        if let Err(e) = self.control_tx.send(msg) {
            tracing::warn!("❌ 控制线程已退出: {}", e);
        }
    }

    fn save_snapshot(&mut self) {
        // 保存屏幕上的画面, 而不是最近收到但可能被丢弃的帧
        let Some(frame) = self.buffer.snapshot() else {
            tracing::warn!("⚠️ 还没有画面, 无法保存");
            return;
        };
        match camlink_rs::snapshot::save_frame(&frame, &self.snapshot_dir) {
            Ok(path) => self.last_snapshot = Some(path.display().to_string()),
            Err(e) => tracing::warn!("❌ {:#}", e),
        }
    }
}
