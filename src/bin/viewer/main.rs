/// 远程相机查看器 (CamLink Viewer)
///
/// 系统架构:
/// 1. 轮询线程: get_camera / get_imu 交替请求, 解码后发给渲染线程
/// 2. 控制线程: 接收UI的LED命令, 发送 set_led
/// 3. 主线程:   渲染显示 (macroquad事件循环)
use camlink_rs::{Args, ChannelSink, ControlMessage, ControlSink, Poller, UdpTransport};
use clap::Parser;
use macroquad::prelude::*;
use std::sync::Arc;

mod renderer;
use renderer::Renderer;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

fn window_conf() -> Conf {
    Conf {
        window_title: "CamLink - 远程相机".to_owned(),
        window_width: 800,
        window_height: 600,
        window_resizable: true,
        ..Default::default()
    }
}

#[macroquad::main(window_conf)]
async fn main() {
    camlink_rs::init_tracing();
    let args = Args::parse();
    let config = args.resolve();
    config.print_summary();

    let transport = match UdpTransport::from_config(&config) {
        Ok(t) => Arc::new(t),
        Err(e) => {
            tracing::error!("❌ {}", e);
            return;
        }
    };
    tracing::info!("📹 设备地址: {}", transport.endpoint());

    // 轮询线程 → 渲染线程 (队列很短, 只要最新画面)
    let (sink, telemetry_rx) = ChannelSink::bounded(4);

    // ========== 启动轮询线程 ==========
    let poller = Poller::new(Arc::clone(&transport), sink, &config);
    let (shutdown, poll_handle) = match poller.spawn() {
        Ok(r) => r,
        Err(e) => {
            tracing::error!("❌ 轮询线程启动失败: {}", e);
            return;
        }
    };

    // ========== 启动控制线程 ==========
    let (control_tx, control_handle) = match ControlSink::new(Arc::clone(&transport)).spawn() {
        Ok(r) => r,
        Err(e) => {
            tracing::error!("❌ 控制线程启动失败: {}", e);
            shutdown.trigger();
            let _ = poll_handle.join();
            return;
        }
    };

    // ========== 主线程: 渲染 ==========
    let mut renderer = Renderer::new(telemetry_rx, control_tx.clone(), &config);
    tracing::info!("✅ 系统就绪 (Tab 切换面板, S 保存快照, Esc 退出)");

    loop {
        if is_key_pressed(KeyCode::Escape) {
            break;
        }
        renderer.handle_input();
        renderer.update();
        renderer.draw();
        renderer.draw_egui();
        next_frame().await;
    }

    shutdown.trigger();
    let _ = control_tx.send(ControlMessage::Shutdown);
    let _ = control_handle.join();
    let _ = poll_handle.join();
}
